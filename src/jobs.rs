use libc::pid_t;

use crate::job::{Job, JobState};

/// Slot index of the reserved foreground job.
pub const FG: usize = 0;
/// Lowest slot index used for background jobs.
pub const BG: usize = 1;

/// The shell's job table: a sparse, index-addressed array of job slots.
///
/// Slot 0 is always reserved for the foreground job (invariant 1). The
/// table grows on demand and never shrinks; freed slots are reused by
/// reassignment (invariant 2), matching the original job table's
/// realloc-once `allocjob`/`allocproc` discipline.
pub struct JobTable {
    slots: Vec<Job>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            slots: vec![Job::default()],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Job> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Job> {
        self.slots.get_mut(slot)
    }

    /// Find the lowest free background slot, growing the table if none exists.
    fn alloc_bg(&mut self) -> usize {
        for i in BG..self.slots.len() {
            if self.slots[i].is_free() {
                return i;
            }
        }
        self.slots.push(Job::default());
        self.slots.len() - 1
    }

    /// Register a freshly-forked pipeline's first stage as a new job.
    /// Returns the slot it was placed in: `FG` if foreground, otherwise the
    /// lowest free background slot.
    pub fn add(&mut self, pgid: pid_t, background: bool) -> usize {
        let slot = if background { self.alloc_bg() } else { FG };
        self.slots[slot] = Job {
            pgid,
            processes: Vec::new(),
            state: JobState::Running,
            command: String::new(),
            terminal_modes: None,
        };
        slot
    }

    /// Append a process record for a freshly-forked stage to `slot`'s job,
    /// extending the display command with that stage's argv.
    pub fn add_process(&mut self, slot: usize, pid: pid_t, argv: &[String]) {
        let job = &mut self.slots[slot];
        job.push_stage_text(argv);
        job.processes.push(crate::process::Process::new(pid));
    }

    /// Free a slot outright (used after a job has been reported Finished).
    pub fn free(&mut self, slot: usize) {
        self.slots[slot] = Job::default();
    }

    /// Move a job record from one slot to another. The destination must be
    /// free; the source becomes free afterward (mirrors `movejob` in the
    /// original job table).
    pub fn move_job(&mut self, from: usize, to: usize) {
        debug_assert!(self.slots[to].is_free());
        self.slots[to] = std::mem::take(&mut self.slots[from]);
    }

    /// Move a stopped foreground job (slot `from`, typically `FG`) into a
    /// freshly allocated background slot, freeing `from`. Returns the new
    /// slot index.
    pub fn evacuate(&mut self, from: usize) -> usize {
        let to = self.alloc_bg();
        self.move_job(from, to);
        to
    }

    /// Find the process record for `pid`, returning its owning slot index.
    pub fn find_pid(&mut self, pid: pid_t) -> Option<usize> {
        self.slots
            .iter()
            .position(|job| job.processes.iter().any(|p| p.pid == pid))
    }

    /// Job number to use as the default `fg`/`bg` target when none is given:
    /// the highest-numbered non-Finished slot.
    pub fn highest_nonfinished(&self) -> Option<usize> {
        (BG..self.slots.len())
            .rev()
            .find(|&i| !self.slots[i].is_free() && self.slots[i].state != JobState::Finished)
    }

    /// Iterate over all occupied (non-free) background slots in ascending order.
    pub fn occupied_background(&self) -> impl Iterator<Item = (usize, &Job)> {
        (BG..self.slots.len()).filter_map(|i| {
            let job = &self.slots[i];
            if job.is_free() { None } else { Some((i, job)) }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_has_free_foreground_slot() {
        let table = JobTable::new();
        assert_eq!(table.len(), 1);
        assert!(table.get(FG).unwrap().is_free());
    }

    #[test]
    fn add_background_assigns_slot_one_first() {
        let mut table = JobTable::new();
        let slot = table.add(100, true);
        assert_eq!(slot, BG);
        assert_eq!(table.get(BG).unwrap().pgid, 100);
    }

    #[test]
    fn add_background_reuses_freed_slots_before_growing() {
        let mut table = JobTable::new();
        let a = table.add(100, true);
        let _b = table.add(200, true);
        table.free(a);
        let c = table.add(300, true);
        assert_eq!(c, a, "freed slot should be reused before growing the table");
    }

    #[test]
    fn add_process_joins_stages_with_pipe_separator() {
        let mut table = JobTable::new();
        let slot = table.add(1, true);
        table.add_process(slot, 1, &["echo".into(), "hi".into()]);
        table.add_process(slot, 2, &["tr".into(), "a-z".into(), "A-Z".into()]);
        assert_eq!(table.get(slot).unwrap().command, "echo hi | tr a-z A-Z");
        assert_eq!(table.get(slot).unwrap().processes.len(), 2);
    }

    #[test]
    fn move_job_frees_source_slot() {
        let mut table = JobTable::new();
        let slot = table.add(42, true);
        table.add_process(slot, 42, &["sleep".into(), "5".into()]);
        table.move_job(slot, FG);
        assert!(table.get(slot).unwrap().is_free());
        assert_eq!(table.get(FG).unwrap().pgid, 42);
    }

    #[test]
    fn highest_nonfinished_skips_finished_and_free_slots() {
        let mut table = JobTable::new();
        let a = table.add(1, true);
        let b = table.add(2, true);
        table.get_mut(b).unwrap().state = JobState::Finished;
        assert_eq!(table.highest_nonfinished(), Some(a));
    }

    #[test]
    fn find_pid_locates_owning_slot() {
        let mut table = JobTable::new();
        let slot = table.add(7, true);
        table.add_process(slot, 7, &["sleep".into()]);
        table.add_process(slot, 8, &["cat".into()]);
        assert_eq!(table.find_pid(8), Some(slot));
        assert_eq!(table.find_pid(999), None);
    }
}
