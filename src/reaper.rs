use std::sync::atomic::{AtomicBool, Ordering};

use libc::{c_int, pid_t};

use crate::job::JobState;
use crate::jobs::JobTable;
use crate::process::ProcState;

/// Set by `handle_sigchld`, cleared by the next `reap`. The handler itself
/// does no async-signal-unsafe work; it only flags that a drain is due.
static SIGCHLD_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigchld(_sig: c_int) {
    SIGCHLD_PENDING.store(true, Ordering::SeqCst);
}

/// Returns true if a SIGCHLD has arrived since the last `reap` call,
/// without clearing the flag.
pub fn pending() -> bool {
    SIGCHLD_PENDING.load(Ordering::SeqCst)
}

/// Install the SIGCHLD handler. `SA_RESTART` so interrupted syscalls other
/// than the ones we deliberately use to detect delivery (`sigsuspend`)
/// resume transparently.
pub fn install() -> std::io::Result<()> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handle_sigchld as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(libc::SIGCHLD, &sa, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Drain every pending child status change with a non-blocking `waitpid`
/// loop, updating process and job state. Clears the pending flag first so a
/// SIGCHLD that arrives mid-drain is not lost (it re-sets the flag and the
/// next `reap` call picks it up).
pub fn reap(table: &mut JobTable) {
    SIGCHLD_PENDING.store(false, Ordering::SeqCst);

    loop {
        let mut status: c_int = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };

        if pid <= 0 {
            break;
        }

        apply_status(table, pid, status);
    }
}

/// Block until the reaper has something new to report: either a pending
/// SIGCHLD is already flagged, or one arrives while suspended. Used by the
/// foreground monitor loop together with a blocked-signal critical section.
pub fn wait_for_signal(saved_mask: &libc::sigset_t) {
    unsafe {
        libc::sigsuspend(saved_mask);
    }
}

fn apply_status(table: &mut JobTable, pid: pid_t, status: c_int) {
    let Some(slot) = table.find_pid(pid) else {
        return;
    };
    let Some(job) = table.get_mut(slot) else {
        return;
    };
    let Some(proc) = job.processes.iter_mut().find(|p| p.pid == pid) else {
        return;
    };

    if libc::WIFEXITED(status) || libc::WIFSIGNALED(status) {
        proc.state = ProcState::Finished;
        proc.exit_status = Some(status);
    } else if libc::WIFSTOPPED(status) {
        proc.state = ProcState::Stopped;
    } else if libc::WIFCONTINUED(status) {
        proc.state = ProcState::Running;
    }

    job.recompute_state();
    if job.state == JobState::Running {
        job.terminal_modes = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_flag_round_trips() {
        assert!(!pending());
        SIGCHLD_PENDING.store(true, Ordering::SeqCst);
        assert!(pending());
        SIGCHLD_PENDING.store(false, Ordering::SeqCst);
    }
}
