use std::ffi::CString;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use libc::{c_int, pid_t};

use crate::error::ShellError;
use crate::job_control::{self, BlockedChldGuard};
use crate::jobs::JobTable;
use crate::parser::Token;
use crate::reaper;
use crate::redirect::{self, Redirections};

/// A single pipeline stage: its word tokens (for display and argv) plus any
/// redirection operators that appeared within it.
pub struct Stage {
    pub tokens: Vec<Token>,
}

/// Split a command line's tokens on `|` into stages, after the caller has
/// already stripped a trailing `&`.
pub fn split_stages(tokens: Vec<Token>) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token == Token::Pipe {
            stages.push(Stage { tokens: std::mem::take(&mut current) });
        } else {
            current.push(token);
        }
    }
    stages.push(Stage { tokens: current });
    stages
}

/// Spawn `stages` as one process group, register it as a job, and — unless
/// `background` — block until it leaves the Running state.
///
/// Preconditions per the launcher contract: the caller already holds
/// `SIGCHLD` blocked (a `BlockedChldGuard` is constructed here and held for
/// the whole call, unblocked only inside the foreground monitor's suspend
/// point) and has already ruled out a single-stage builtin match.
pub fn launch(
    jobs_table: &mut JobTable,
    tty_fd: RawFd,
    shell_pgid: pid_t,
    shell_modes: &libc::termios,
    stages: Vec<Stage>,
    background: bool,
) -> i32 {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(e) => {
            eprintln!("jsh: failed to block SIGCHLD: {e}");
            return 1;
        }
    };

    let n = stages.len();
    let mut pgid: pid_t = 0;
    let mut slot: Option<usize> = None;
    let mut prev_read_end: Option<OwnedFd> = None;

    for (i, stage) in stages.into_iter().enumerate() {
        let is_last = i + 1 == n;

        // Resolved immediately before this stage forks, not up front: an
        // earlier stage's child must never see a later stage's redirection
        // descriptor, and `redirs` here is dropped (closing it) at the end
        // of this same iteration in the parent, before the next stage forks.
        let (words, redirs) = match redirect::resolve(&stage.tokens) {
            Ok((words, redirs)) => {
                if words.is_empty() {
                    eprintln!("jsh: syntax error: empty pipeline stage");
                    return 1;
                }
                (words, redirs)
            }
            Err(msg) => {
                eprintln!("{msg}");
                return 1;
            }
        };

        let next_pipe = if !is_last {
            match make_pipe() {
                Ok(pair) => Some(pair),
                Err(e) => {
                    eprintln!("jsh: failed to create pipe: {e}");
                    return 1;
                }
            }
        } else {
            None
        };

        let stdin_fd = prev_read_end.take();
        let stdout_fd = next_pipe.as_ref().map(|(_, w)| w.as_raw_fd());
        let next_read_end = next_pipe.map(|(r, _)| r);

        let pid = unsafe { libc::fork() };
        if pid < 0 {
            eprintln!("jsh: fork failed: {}", std::io::Error::last_os_error());
            return 1;
        }

        if pid == 0 {
            child_exec(
                &words,
                redirs,
                stdin_fd,
                stdout_fd,
                pgid,
            );
        }

        // parent
        let _ = job_control::set_process_group(pid, if pgid == 0 { pid } else { pgid });
        if pgid == 0 {
            pgid = pid;
            slot = Some(jobs_table.add(pgid, background));
        }
        if let Some(slot) = slot {
            jobs_table.add_process(slot, pid, &words);
        }

        prev_read_end = next_read_end;
    }

    let Some(slot) = slot else {
        return 0;
    };

    if background {
        let command = jobs_table.get(slot).map(|j| j.command.clone()).unwrap_or_default();
        eprintln!("[{slot}] running '{command}'");
        drop(guard);
        return 0;
    }

    let code = monitor(jobs_table, tty_fd, shell_pgid, shell_modes, slot, &guard);
    drop(guard);
    code
}

fn make_pipe() -> std::io::Result<(OwnedFd, OwnedFd)> {
    use std::os::fd::FromRawFd;

    let mut fds = [0 as c_int; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

/// Child-side setup after `fork`: restore job-control signals to their
/// default disposition, unblock `SIGCHLD`, wire up stdin/stdout, join the
/// pipeline's process group, then exec. Never returns.
fn child_exec(
    words: &[String],
    redirs: Redirections,
    stdin_fd: Option<OwnedFd>,
    stdout_fd: Option<RawFd>,
    pgid: pid_t,
) -> ! {
    unsafe {
        for sig in [libc::SIGINT, libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU] {
            libc::signal(sig, libc::SIG_DFL);
        }

        let mut unblock: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut unblock);
        libc::sigaddset(&mut unblock, libc::SIGCHLD);
        libc::sigprocmask(libc::SIG_UNBLOCK, &unblock, std::ptr::null_mut());

        if let Some(fd) = redirs.stdin {
            let raw = fd.into_raw_fd();
            libc::dup2(raw, libc::STDIN_FILENO);
            if raw != libc::STDIN_FILENO {
                libc::close(raw);
            }
        } else if let Some(fd) = stdin_fd {
            let raw = fd.into_raw_fd();
            libc::dup2(raw, libc::STDIN_FILENO);
            if raw != libc::STDIN_FILENO {
                libc::close(raw);
            }
        }

        if let Some(fd) = redirs.stdout {
            let raw = fd.into_raw_fd();
            libc::dup2(raw, libc::STDOUT_FILENO);
            if raw != libc::STDOUT_FILENO {
                libc::close(raw);
            }
        } else if let Some(raw) = stdout_fd {
            libc::dup2(raw, libc::STDOUT_FILENO);
            if raw != libc::STDOUT_FILENO {
                libc::close(raw);
            }
        }

        libc::setpgid(0, pgid);
    }

    exec_with_path_search(words);
}

/// Search `PATH` (or exec directly if `argv[0]` contains `/`) and replace
/// the current process image. On total failure, report the reason and exit
/// 127 (not found) or 126 (found but not executable).
fn exec_with_path_search(words: &[String]) -> ! {
    let argv0 = &words[0];
    let cargs: Vec<CString> = words.iter().map(|w| CString::new(w.as_str()).unwrap()).collect();
    let mut argv_ptrs: Vec<*const libc::c_char> = cargs.iter().map(|c| c.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    let mut found_but_not_executable = false;

    if argv0.contains('/') {
        let cpath = CString::new(argv0.as_str()).unwrap();
        unsafe { libc::execv(cpath.as_ptr(), argv_ptrs.as_ptr()) };
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EACCES) {
            found_but_not_executable = true;
        }
        report_exec_failure(argv0, &err);
        unsafe { libc::_exit(if found_but_not_executable { 126 } else { 127 }) };
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in path_var.split(':') {
            let candidate = format!("{dir}/{argv0}");
            let cpath = CString::new(candidate.clone()).unwrap();
            unsafe { libc::execv(cpath.as_ptr(), argv_ptrs.as_ptr()) };
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EACCES) {
                found_but_not_executable = true;
            }
        }
    }

    let err = std::io::Error::last_os_error();
    report_exec_failure(argv0, &err);
    unsafe { libc::_exit(if found_but_not_executable { 126 } else { 127 }) };
}

fn report_exec_failure(argv0: &str, err: &std::io::Error) {
    eprintln!("{argv0}: {err}");
}

/// Transfer the terminal to the foreground job's process group, wait until
/// it leaves the Running state, and restore shell ownership/terminal modes
/// regardless of outcome. Returns the job's exit status (meaningful only if
/// it finished rather than stopped).
pub(crate) fn monitor(
    jobs_table: &mut JobTable,
    tty_fd: RawFd,
    shell_pgid: pid_t,
    shell_modes: &libc::termios,
    slot: usize,
    guard: &BlockedChldGuard,
) -> i32 {
    let pgid = jobs_table.get(slot).map(|j| j.pgid).unwrap_or(0);

    let _term_guard = match job_control::ForegroundTerminalGuard::new(tty_fd, shell_pgid, pgid) {
        Ok(g) => Some(g),
        Err(e) => {
            eprintln!("jsh: {}", ShellError::Terminal(e.to_string()));
            None
        }
    };

    loop {
        reaper::reap(jobs_table);
        match jobs_table.get(slot).map(|j| j.state) {
            Some(crate::job::JobState::Running) => {
                guard.suspend_for_signal();
                continue;
            }
            _ => break,
        }
    }

    let result = match jobs_table.get(slot).map(|j| j.state) {
        Some(crate::job::JobState::Stopped) => {
            if let Some(job) = jobs_table.get_mut(slot) {
                job.terminal_modes = job_control::get_terminal_modes(tty_fd).ok();
            }
            // Evacuated silently: the suspended message is only ever printed
            // by the `jobs` builtin when the job is later listed.
            jobs_table.evacuate(slot);
            0
        }
        Some(crate::job::JobState::Finished) => {
            let code = jobs_table
                .get(slot)
                .and_then(|j| j.exit_status())
                .and_then(crate::status::exit_code_from_status)
                .unwrap_or(1);
            jobs_table.free(slot);
            code
        }
        _ => 0,
    };

    drop(_term_guard);
    let _ = job_control::set_terminal_modes(tty_fd, shell_modes);

    result
}
