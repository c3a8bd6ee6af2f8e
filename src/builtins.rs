use crate::error::ShellError;
use crate::job::JobState;
use crate::job_control::{self, BlockedChldGuard};
use crate::jobs::{self, JobTable};
use crate::reaper;
use crate::status;

/// The list of all builtin command names.
const BUILTINS: &[&str] = &["cd", "pwd", "quit", "history", "jobs", "fg", "bg", "kill"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// What a builtin asks the caller (the REPL loop) to do next.
pub enum Outcome {
    Continue(i32),
    Exit(i32),
}

/// Shared state builtins need: the job table, terminal identity, and the
/// in-memory history list. Owned by `Shell` and borrowed mutably here.
pub struct Context<'a> {
    pub jobs: &'a mut JobTable,
    pub tty_fd: libc::c_int,
    pub shell_pgid: libc::pid_t,
    pub shell_modes: &'a libc::termios,
    pub history: &'a [String],
}

pub fn execute(program: &str, args: &[String], ctx: &mut Context) -> Outcome {
    match program {
        "cd" => Outcome::Continue(builtin_cd(args)),
        "pwd" => Outcome::Continue(builtin_pwd()),
        "quit" => Outcome::Exit(builtin_quit(ctx)),
        "history" => Outcome::Continue(builtin_history(ctx)),
        "jobs" => Outcome::Continue(builtin_jobs(ctx)),
        "fg" => Outcome::Continue(builtin_fg(args, ctx)),
        "bg" => Outcome::Continue(builtin_bg(args, ctx)),
        "kill" => Outcome::Continue(builtin_kill(args, ctx)),
        _ => {
            eprintln!("jsh: unknown builtin: {program}");
            Outcome::Continue(1)
        }
    }
}

fn builtin_cd(args: &[String]) -> i32 {
    let target = match args.first() {
        Some(dir) => dir.clone(),
        None => match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("cd: HOME not set");
                return 1;
            }
        },
    };

    if let Err(e) = std::env::set_current_dir(&target) {
        eprintln!("cd: {e}: {target}");
        return 1;
    }
    0
}

fn builtin_pwd() -> i32 {
    match std::env::current_dir() {
        Ok(path) => {
            println!("{}", path.display());
            0
        }
        Err(e) => {
            eprintln!("pwd: {}", ShellError::Io(e));
            1
        }
    }
}

fn builtin_history(ctx: &mut Context) -> i32 {
    for (i, line) in ctx.history.iter().enumerate() {
        println!("{:5}  {line}", i + 1);
    }
    0
}

/// Shutdown sequence: terminate every live job, report them, and exit.
/// Called from both the `quit` builtin and EOF on the read loop.
fn builtin_quit(ctx: &mut Context) -> i32 {
    shutdown(ctx);
    0
}

/// Terminate and reap every non-free job, report each, then return.
pub fn shutdown(ctx: &mut Context) {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(e) => {
            eprintln!("jsh: failed to block SIGCHLD during shutdown: {e}");
            return;
        }
    };

    let live_slots: Vec<usize> = ctx
        .jobs
        .occupied_background()
        .filter(|(_, job)| job.state != JobState::Finished)
        .map(|(slot, _)| slot)
        .collect();

    for slot in live_slots {
        if let Some(job) = ctx.jobs.get(slot) {
            let _ = job_control::send_signal_to_group(job.pgid, libc::SIGTERM);
        }
        loop {
            reaper::reap(ctx.jobs);
            match ctx.jobs.get(slot).map(|j| j.state) {
                Some(JobState::Finished) | None => break,
                _ => guard.suspend_for_signal(),
            }
        }
    }

    sweep_finished(ctx);
    drop(guard);
}

/// Print `[n] exited '<cmd>', status=K` / `killed ... by signal K` for every
/// Finished job, then remove it from the table. Called after every command
/// and at the end of shutdown.
pub fn sweep_finished(ctx: &mut Context) {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(_) => return,
    };

    reaper::reap(ctx.jobs);

    let finished: Vec<usize> = ctx
        .jobs
        .occupied_background()
        .filter(|(_, job)| job.state == JobState::Finished)
        .map(|(slot, _)| slot)
        .collect();

    for slot in finished {
        if let Some(job) = ctx.jobs.get(slot) {
            report_finished(slot, job);
        }
        ctx.jobs.free(slot);
    }

    drop(guard);
}

fn report_finished(slot: usize, job: &crate::job::Job) {
    let raw_status = job.exit_status();
    match raw_status.and_then(status::terminating_signal) {
        Some(sig) => eprintln!("[{slot}] killed '{}' by signal {sig}", job.command),
        None => {
            let code = raw_status.and_then(status::exit_code_from_status).unwrap_or(0);
            eprintln!("[{slot}] exited '{}', status={code}", job.command);
        }
    }
}

fn builtin_jobs(ctx: &mut Context) -> i32 {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(_) => return 1,
    };

    reaper::reap(ctx.jobs);

    let slots: Vec<usize> = ctx.jobs.occupied_background().map(|(slot, _)| slot).collect();
    for slot in slots {
        let Some(job) = ctx.jobs.get(slot) else { continue };
        match job.state {
            JobState::Running => eprintln!("[{slot}] running '{}'", job.command),
            JobState::Stopped => eprintln!("[{slot}] suspended '{}'", job.command),
            JobState::Finished => report_finished(slot, job),
        }
        if job.state == JobState::Finished {
            ctx.jobs.free(slot);
        }
    }

    drop(guard);
    0
}

fn parse_job_arg(args: &[String], ctx: &Context) -> Option<usize> {
    match args.first() {
        Some(s) => {
            let n: usize = s.trim_start_matches('%').parse().ok()?;
            if ctx.jobs.get(n).is_some_and(|j| !j.is_free()) {
                Some(n)
            } else {
                None
            }
        }
        None => ctx.jobs.highest_nonfinished(),
    }
}

fn builtin_fg(args: &[String], ctx: &mut Context) -> i32 {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(_) => return 1,
    };

    let Some(slot) = parse_job_arg(args, ctx) else {
        drop(guard);
        eprintln!("{}", ShellError::JobNotFound("fg"));
        return 1;
    };

    let _ = job_control::set_terminal_modes(ctx.tty_fd, ctx.shell_modes);

    ctx.jobs.move_job(slot, jobs::FG);
    let command = ctx
        .jobs
        .get(jobs::FG)
        .map(|j| j.command.clone())
        .unwrap_or_default();
    let pgid = ctx.jobs.get(jobs::FG).map(|j| j.pgid).unwrap_or(0);

    if let Some(job) = ctx.jobs.get_mut(jobs::FG) {
        job.state = JobState::Running;
        for p in &mut job.processes {
            p.state = crate::process::ProcState::Running;
        }
    }

    let _ = job_control::set_terminal_foreground(ctx.tty_fd, pgid);
    let _ = job_control::send_signal_to_group(pgid, libc::SIGCONT);
    eprintln!("[{}] continue '{command}'", jobs::FG);

    let code = crate::executor::monitor(ctx.jobs, ctx.tty_fd, ctx.shell_pgid, ctx.shell_modes, jobs::FG, &guard);
    drop(guard);
    code
}

fn builtin_bg(args: &[String], ctx: &mut Context) -> i32 {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(_) => return 1,
    };

    let Some(slot) = parse_job_arg(args, ctx) else {
        drop(guard);
        eprintln!("{}", ShellError::JobNotFound("bg"));
        return 1;
    };

    let is_stopped = ctx.jobs.get(slot).is_some_and(|j| j.state == JobState::Stopped);
    if !is_stopped {
        drop(guard);
        eprintln!("{}", ShellError::JobNotFound("bg"));
        return 1;
    }

    let pgid = ctx.jobs.get(slot).map(|j| j.pgid).unwrap_or(0);
    let command = ctx.jobs.get(slot).map(|j| j.command.clone()).unwrap_or_default();

    let _ = job_control::send_signal_to_group(pgid, libc::SIGCONT);
    if let Some(job) = ctx.jobs.get_mut(slot) {
        job.state = JobState::Running;
        job.terminal_modes = None;
        for p in &mut job.processes {
            p.state = crate::process::ProcState::Running;
        }
    }
    eprintln!("[{slot}] continue '{command}'");

    drop(guard);
    0
}

fn builtin_kill(args: &[String], ctx: &mut Context) -> i32 {
    let guard = match BlockedChldGuard::block() {
        Ok(g) => g,
        Err(_) => return 1,
    };

    let Some(slot) = parse_job_arg(args, ctx) else {
        drop(guard);
        eprintln!("{}", ShellError::JobNotFound("kill"));
        return 1;
    };

    let Some(job) = ctx.jobs.get(slot) else {
        drop(guard);
        eprintln!("{}", ShellError::JobNotFound("kill"));
        return 1;
    };
    let pgid = job.pgid;
    let is_stopped = job.state == JobState::Stopped;

    if is_stopped {
        let _ = job_control::set_terminal_foreground(ctx.tty_fd, pgid);
        if let Some(modes) = ctx.jobs.get(slot).and_then(|j| j.terminal_modes.as_ref()) {
            let _ = job_control::set_terminal_modes(ctx.tty_fd, modes);
        }
        let _ = job_control::send_signal_to_group(pgid, libc::SIGTERM);
        let _ = job_control::send_signal_to_group(pgid, libc::SIGCONT);
        let _ = job_control::set_terminal_foreground(ctx.tty_fd, ctx.shell_pgid);
        let _ = job_control::set_terminal_modes(ctx.tty_fd, ctx.shell_modes);
    } else {
        let _ = job_control::send_signal_to_group(pgid, libc::SIGTERM);
    }

    drop(guard);
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobTable;

    fn test_context<'a>(jobs: &'a mut JobTable, modes: &'a libc::termios, history: &'a [String]) -> Context<'a> {
        Context {
            jobs,
            tty_fd: -1,
            shell_pgid: 1,
            shell_modes: modes,
            history,
        }
    }

    #[test]
    fn is_builtin_recognizes_every_listed_name() {
        for name in BUILTINS {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("ls"));
        assert!(!is_builtin(""));
    }

    #[test]
    fn parse_job_arg_defaults_to_highest_nonfinished() {
        let mut jobs = JobTable::new();
        jobs.add(100, true);
        jobs.add(200, true);
        let modes: libc::termios = unsafe { std::mem::zeroed() };
        let ctx = test_context(&mut jobs, &modes, &[]);
        assert_eq!(parse_job_arg(&[], &ctx), Some(2));
    }

    #[test]
    fn parse_job_arg_accepts_percent_prefix() {
        let mut jobs = JobTable::new();
        jobs.add(100, true);
        let modes: libc::termios = unsafe { std::mem::zeroed() };
        let ctx = test_context(&mut jobs, &modes, &[]);
        assert_eq!(parse_job_arg(&["%1".to_string()], &ctx), Some(1));
    }

    #[test]
    fn parse_job_arg_rejects_free_slot() {
        let mut jobs = JobTable::new();
        jobs.add(100, true);
        let modes: libc::termios = unsafe { std::mem::zeroed() };
        let ctx = test_context(&mut jobs, &modes, &[]);
        assert_eq!(parse_job_arg(&["5".to_string()], &ctx), None);
    }

    #[test]
    fn builtin_cd_to_missing_directory_reports_error_and_leaves_cwd() {
        let before = std::env::current_dir().unwrap();
        let code = builtin_cd(&["/no/such/directory/jsh-test".to_string()]);
        assert_eq!(code, 1);
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn builtin_pwd_succeeds() {
        assert_eq!(builtin_pwd(), 0);
    }

    #[test]
    fn history_builtin_numbers_entries_from_one() {
        let mut jobs = JobTable::new();
        let modes: libc::termios = unsafe { std::mem::zeroed() };
        let history = vec!["echo first".to_string(), "echo second".to_string()];
        let mut ctx = test_context(&mut jobs, &modes, &history);
        assert_eq!(builtin_history(&mut ctx), 0);
    }
}
