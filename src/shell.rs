use libc::{c_int, pid_t};

use crate::builtins::{self, Context};
use crate::error::{FatalError, ShellError};
use crate::executor::{self, Stage};
use crate::jobs::JobTable;
use crate::parser::{self, Token};
use crate::reader::Reader;
use crate::reaper;

/// The shell's entire mutable state, constructed once at startup and driven
/// by the read-eval loop until `quit` or end-of-input.
pub struct Shell {
    jobs: JobTable,
    tty_fd: c_int,
    shell_pgid: pid_t,
    terminal_modes: libc::termios,
    last_exit_code: i32,
    reader: Reader,
}

impl Shell {
    /// Startup sequence (§4.7): verify a controlling terminal, become
    /// process-group leader if needed, install signal handlers, seize the
    /// terminal, and snapshot its modes.
    pub fn new() -> Result<Self, FatalError> {
        Self::start(true)
    }

    /// Startup for the `-c COMMAND` CLI path: the stdin-is-a-terminal check
    /// is skipped (test harnesses and scripts commonly pipe `-c`'s stdin),
    /// but terminal/job-control setup still runs against whatever fd 0 is.
    pub fn new_noninteractive() -> Result<Self, FatalError> {
        Self::start(false)
    }

    fn start(require_tty: bool) -> Result<Self, FatalError> {
        if require_tty && unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
            return Err(FatalError::NotATerminal);
        }

        unsafe {
            let pid = libc::getpid();
            if libc::getpgid(0) != libc::getsid(0) {
                libc::setpgid(0, pid);
            }
        }

        reaper::install().map_err(FatalError::SignalInstall)?;

        unsafe {
            if libc::signal(libc::SIGINT, noop_sigint as libc::sighandler_t) == libc::SIG_ERR {
                return Err(FatalError::SignalInstall(std::io::Error::last_os_error()));
            }
            libc::signal(libc::SIGTSTP, libc::SIG_IGN);
            libc::signal(libc::SIGTTIN, libc::SIG_IGN);
            libc::signal(libc::SIGTTOU, libc::SIG_IGN);
        }

        let tty_fd = unsafe { libc::dup(libc::STDIN_FILENO) };
        if tty_fd < 0 {
            return Err(FatalError::Terminal(std::io::Error::last_os_error()));
        }
        unsafe {
            let flags = libc::fcntl(tty_fd, libc::F_GETFD);
            libc::fcntl(tty_fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }

        let shell_pgid = unsafe { libc::getpgrp() };
        if require_tty && unsafe { libc::tcsetpgrp(tty_fd, shell_pgid) } != 0 {
            return Err(FatalError::Terminal(std::io::Error::last_os_error()));
        }

        let terminal_modes = crate::job_control::get_terminal_modes(tty_fd).unwrap_or_else(|_| {
            // stdin isn't a terminal (the `-c` path): there are no modes to
            // snapshot or later restore, so default-initialize and let every
            // subsequent tcsetattr/tcsetpgrp call fail harmlessly (ENOTTY).
            unsafe { std::mem::zeroed() }
        });

        Ok(Shell {
            jobs: JobTable::new(),
            tty_fd,
            shell_pgid,
            terminal_modes,
            last_exit_code: 0,
            reader: Reader::new(),
        })
    }

    /// The read-eval-print loop. EOF and bare `quit` both end the shell
    /// with exit code 0 regardless of the last command's status — only the
    /// per-command `[n] exited '...'`/`killed '...'` reports carry that.
    pub fn run(&mut self) -> i32 {
        loop {
            match self.reader.read_line("# ") {
                Ok(None) => {
                    self.shutdown();
                    break;
                }
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        self.last_exit_code = self.eval(&line);
                    }
                    self.sweep();
                }
                Err(_) => continue,
            }
        }
        0
    }

    /// Run a single command line non-interactively (the `-c` CLI flag).
    pub fn run_one(&mut self, line: &str) -> i32 {
        let code = self.eval(line);
        self.sweep();
        code
    }

    fn context(&mut self) -> Context<'_> {
        Context {
            jobs: &mut self.jobs,
            tty_fd: self.tty_fd,
            shell_pgid: self.shell_pgid,
            shell_modes: &self.terminal_modes,
            history: self.reader.history(),
        }
    }

    fn sweep(&mut self) {
        let mut ctx = self.context();
        builtins::sweep_finished(&mut ctx);
    }

    fn shutdown(&mut self) {
        let mut ctx = self.context();
        builtins::shutdown(&mut ctx);
        let _ = unsafe { libc::close(self.tty_fd) };
    }

    /// Tokenize, strip a trailing `&`, split on `|`, and dispatch as a
    /// builtin (single foreground stage only) or a pipeline.
    fn eval(&mut self, line: &str) -> i32 {
        let mut tokens = parser::tokenize(line);
        if tokens.is_empty() {
            return self.last_exit_code;
        }

        let background = matches!(tokens.last(), Some(Token::Amp));
        if background {
            tokens.pop();
        }
        if tokens.is_empty() {
            eprintln!("{}", ShellError::Syntax("unexpected token '&'".into()));
            return 1;
        }

        let stages = executor::split_stages(tokens);

        if !background && stages.len() == 1 {
            if let Some(Token::Word(program)) = stages[0].tokens.first() {
                if builtins::is_builtin(program) {
                    let program = program.clone();
                    // The filename operand right after `<`/`>` is a
                    // redirection target, not a builtin argument.
                    let mut args = Vec::new();
                    let mut skip_next = false;
                    for token in stages[0].tokens.iter().skip(1) {
                        if skip_next {
                            skip_next = false;
                            continue;
                        }
                        match token {
                            Token::Less | Token::Great => skip_next = true,
                            Token::Word(w) => args.push(w.clone()),
                            _ => {}
                        }
                    }
                    let mut ctx = self.context();
                    return match builtins::execute(&program, &args, &mut ctx) {
                        builtins::Outcome::Continue(code) => code,
                        builtins::Outcome::Exit(code) => {
                            std::process::exit(code);
                        }
                    };
                }
            }
        }

        self.launch(stages, background)
    }

    fn launch(&mut self, stages: Vec<Stage>, background: bool) -> i32 {
        executor::launch(
            &mut self.jobs,
            self.tty_fd,
            self.shell_pgid,
            &self.terminal_modes,
            stages,
            background,
        )
    }
}

extern "C" fn noop_sigint(_sig: c_int) {}
