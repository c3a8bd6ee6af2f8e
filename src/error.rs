use thiserror::Error;

/// Errors that can surface while evaluating a single command line.
///
/// Every variant here is handled inline by the REPL: printed to stderr and
/// converted into an exit code. Nothing in this enum ever escapes `eval`.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("terminal control failed: {0}")]
    Terminal(String),

    #[error("jsh: syntax error: {0}")]
    Syntax(String),

    #[error("{0}: job not found")]
    JobNotFound(&'static str),
}

/// Errors that abort the shell entirely (startup failures only).
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("standard input is not a terminal")]
    NotATerminal,

    #[error("failed to install signal handler: {0}")]
    SignalInstall(std::io::Error),

    #[error("terminal control failed: {0}")]
    Terminal(std::io::Error),
}
