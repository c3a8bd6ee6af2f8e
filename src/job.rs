use libc::pid_t;

use crate::process::{ProcState, Process};

/// The derived lifecycle state of a job (lattice over its processes' states).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Finished,
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Running
    }
}

/// One pipeline: one or more processes sharing a process group.
///
/// A slot with `pgid == 0` is free (invariant 2): empty `processes`, empty
/// `command`. `terminal_modes` is only populated while the job is stopped,
/// and is consumed the next time the job is resumed to the foreground.
#[derive(Default)]
pub struct Job {
    pub pgid: pid_t,
    pub processes: Vec<Process>,
    pub state: JobState,
    pub command: String,
    pub terminal_modes: Option<libc::termios>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("pgid", &self.pgid)
            .field("processes", &self.processes)
            .field("state", &self.state)
            .field("command", &self.command)
            .field("terminal_modes", &self.terminal_modes.is_some())
            .finish()
    }
}

impl Job {
    pub fn is_free(&self) -> bool {
        self.pgid == 0
    }

    /// Append `argv`'s words to the job's display command, joining
    /// successive pipeline stages with `" | "`.
    pub fn push_stage_text(&mut self, argv: &[String]) {
        if !self.command.is_empty() {
            self.command.push_str(" | ");
        }
        self.command.push_str(&argv.join(" "));
    }

    /// Recompute `state` from `processes` per the invariant-3 lattice:
    /// any Running wins, else any Stopped wins, else Finished.
    pub fn recompute_state(&mut self) {
        let any_running = self
            .processes
            .iter()
            .any(|p| p.state == ProcState::Running);
        let any_stopped = self
            .processes
            .iter()
            .any(|p| p.state == ProcState::Stopped);

        self.state = if any_running {
            JobState::Running
        } else if any_stopped {
            JobState::Stopped
        } else {
            JobState::Finished
        };
    }

    /// The job's exit status, taken from its last stage (only meaningful
    /// once `state == Finished`).
    pub fn exit_status(&self) -> Option<libc::c_int> {
        self.processes.last().and_then(|p| p.exit_status)
    }
}
