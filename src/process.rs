use libc::{c_int, pid_t};

/// The lifecycle state of a single tracked process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Stopped,
    Finished,
}

/// One OS process belonging to a job.
///
/// `exit_status` holds the raw `waitpid` status word and is only meaningful
/// once `state == Finished` (invariant 6).
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: pid_t,
    pub state: ProcState,
    pub exit_status: Option<c_int>,
}

impl Process {
    pub fn new(pid: pid_t) -> Self {
        Process {
            pid,
            state: ProcState::Running,
            exit_status: None,
        }
    }
}
