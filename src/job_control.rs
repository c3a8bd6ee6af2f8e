use std::io;

use libc::{c_int, pid_t};

/// Blocks SIGCHLD for the lifetime of the guard and restores the previous
/// signal mask on drop. Every critical section that reads or mutates the
/// job table (the `fg`/`bg`/`kill`/`jobs` builtins, the monitor loop, and
/// shutdown) is wrapped in one of these so a SIGCHLD can't fire in the
/// middle of a table update.
pub struct BlockedChldGuard {
    saved_mask: libc::sigset_t,
}

impl BlockedChldGuard {
    pub fn block() -> io::Result<Self> {
        unsafe {
            let mut block_set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut block_set);
            libc::sigaddset(&mut block_set, libc::SIGCHLD);

            let mut saved_mask: libc::sigset_t = std::mem::zeroed();
            if libc::sigprocmask(libc::SIG_BLOCK, &block_set, &mut saved_mask) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(BlockedChldGuard { saved_mask })
        }
    }

    /// Atomically unblock SIGCHLD and wait for one to arrive (or for any
    /// other unblocked signal, whichever fires first). Used by the
    /// foreground monitor loop so there is no window between checking job
    /// state and waiting in which a SIGCHLD could be missed.
    pub fn suspend_for_signal(&self) {
        let mut wait_mask = self.saved_mask;
        unsafe {
            libc::sigdelset(&mut wait_mask, libc::SIGCHLD);
            libc::sigsuspend(&wait_mask);
        }
    }
}

impl Drop for BlockedChldGuard {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.saved_mask, std::ptr::null_mut());
        }
    }
}

/// Assign `pid` to process group `pgid`, creating it if `pid == pgid`.
/// Called from both the parent and the child immediately after `fork` to
/// close the race where the child execs before the parent has set its
/// group (invariant 4).
pub fn set_process_group(pid: pid_t, pgid: pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            // Child already exec'd or already gone: both sides raced to set
            // the same group, which is the expected outcome, not a failure.
            Some(libc::EACCES) | Some(libc::ESRCH) => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Send `sig` to every process in group `pgid`.
pub fn send_signal_to_group(pgid: pid_t, sig: c_int) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    loop {
        let rc = unsafe { libc::kill(-pgid, sig) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Make `pgid` the terminal's foreground process group on `fd`. SIGTTOU is
/// ignored for the duration of the call: the shell itself is commonly not
/// the foreground group when it calls this (it's handing the terminal to a
/// job), and without the ignore it would stop itself.
pub fn set_terminal_foreground(fd: c_int, pgid: pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    let _ignore_ttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// RAII: hands the terminal to `target_pgid` on construction, restores
/// `shell_pgid` on drop regardless of how the job left the foreground
/// (exited, was killed, or was stopped and evacuated elsewhere).
pub struct ForegroundTerminalGuard {
    tty_fd: c_int,
    shell_pgid: pid_t,
}

impl ForegroundTerminalGuard {
    pub fn new(tty_fd: c_int, shell_pgid: pid_t, target_pgid: pid_t) -> io::Result<Self> {
        set_terminal_foreground(tty_fd, target_pgid)?;
        Ok(ForegroundTerminalGuard {
            tty_fd,
            shell_pgid,
        })
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        let _ = set_terminal_foreground(self.tty_fd, self.shell_pgid);
    }
}

struct SignalIgnoreGuard {
    signal: c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(SignalIgnoreGuard { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

/// Save the terminal's current mode settings (for `tcsetattr` restore).
pub fn get_terminal_modes(fd: c_int) -> io::Result<libc::termios> {
    unsafe {
        let mut modes: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut modes) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(modes)
    }
}

/// Restore previously-saved terminal mode settings immediately.
pub fn set_terminal_modes(fd: c_int, modes: &libc::termios) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::tcsetattr(fd, libc::TCSADRAIN, modes) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
