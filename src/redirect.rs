use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::parser::Token;

/// Two optional open descriptors produced by resolving a token slice's
/// redirection operators: index 0 is stdin, index 1 is stdout.
#[derive(Default)]
pub struct Redirections {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PendingMode {
    None,
    Input,
    Output,
}

/// Split `tokens` into the compacted word-only slice and the descriptors
/// named by its `<`/`>` operators. Only the last redirection of each
/// direction takes effect; earlier descriptors of that direction are closed
/// as soon as a later one is opened. A failed `open` is reported to stderr
/// and returned as an error, leaking no descriptor.
pub fn resolve(tokens: &[Token]) -> Result<(Vec<String>, Redirections), String> {
    let mut words = Vec::new();
    let mut redirs = Redirections::default();
    let mut pending = PendingMode::None;

    for token in tokens {
        match (pending, token) {
            (PendingMode::None, Token::Word(w)) => words.push(w.clone()),
            (PendingMode::None, Token::Less) => pending = PendingMode::Input,
            (PendingMode::None, Token::Great) => pending = PendingMode::Output,
            (PendingMode::None, Token::Pipe | Token::Amp) => {
                // The caller is responsible for splitting on `|` and
                // stripping a trailing `&` before calling `resolve`; seeing
                // either here means a stage-internal redirection slice, and
                // bare operators inside it are words by definition.
            }
            (mode, token) => {
                let path = match token {
                    Token::Word(w) => w.clone(),
                    _ => return Err("jsh: syntax error: expected filename after redirection".into()),
                };
                let fd = open_for(mode, &path)?;
                match mode {
                    PendingMode::Input => redirs.stdin = Some(fd),
                    PendingMode::Output => redirs.stdout = Some(fd),
                    PendingMode::None => unreachable!(),
                }
                pending = PendingMode::None;
            }
        }
    }

    if pending != PendingMode::None {
        return Err("jsh: syntax error: expected filename after redirection".into());
    }

    Ok((words, redirs))
}

fn open_for(mode: PendingMode, path: &str) -> Result<OwnedFd, String> {
    let raw: RawFd = unsafe {
        match mode {
            PendingMode::Input => {
                let cpath = std::ffi::CString::new(path).map_err(|_| invalid_path(path))?;
                libc::open(cpath.as_ptr(), libc::O_RDONLY)
            }
            PendingMode::Output => {
                let cpath = std::ffi::CString::new(path).map_err(|_| invalid_path(path))?;
                libc::open(
                    cpath.as_ptr(),
                    libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                    0o644,
                )
            }
            PendingMode::None => unreachable!(),
        }
    };

    if raw < 0 {
        let err = std::io::Error::last_os_error();
        return Err(format!("jsh: {path}: {err}"));
    }

    let fd = unsafe { OwnedFd::from_raw_fd(raw) };
    debug_assert_eq!(fd.as_raw_fd(), raw);
    Ok(fd)
}

fn invalid_path(path: &str) -> String {
    format!("jsh: {path}: invalid path")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_pass_through_untouched() {
        let tokens = vec![Token::Word("echo".into()), Token::Word("hi".into())];
        let (words, redirs) = resolve(&tokens).unwrap();
        assert_eq!(words, vec!["echo", "hi"]);
        assert!(redirs.stdin.is_none());
        assert!(redirs.stdout.is_none());
    }

    #[test]
    fn missing_filename_after_redirect_is_error() {
        let tokens = vec![Token::Word("echo".into()), Token::Great];
        assert!(resolve(&tokens).is_err());
    }

    #[test]
    fn output_redirect_opens_and_compacts() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("jsh-redirect-test-{}", std::process::id()));
        let path_str = path.to_str().unwrap().to_string();

        let tokens = vec![
            Token::Word("echo".into()),
            Token::Word("hi".into()),
            Token::Great,
            Token::Word(path_str.clone()),
        ];
        let (words, redirs) = resolve(&tokens).unwrap();
        assert_eq!(words, vec!["echo", "hi"]);
        assert!(redirs.stdout.is_some());
        assert!(redirs.stdin.is_none());

        drop(redirs);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn second_redirect_of_same_direction_wins() {
        let dir = std::env::temp_dir();
        let first = dir.join(format!("jsh-redirect-a-{}", std::process::id()));
        let second = dir.join(format!("jsh-redirect-b-{}", std::process::id()));

        let tokens = vec![
            Token::Word("echo".into()),
            Token::Great,
            Token::Word(first.to_str().unwrap().into()),
            Token::Great,
            Token::Word(second.to_str().unwrap().into()),
        ];
        let (_, redirs) = resolve(&tokens).unwrap();
        assert!(redirs.stdout.is_some());

        std::fs::remove_file(&first).ok();
        std::fs::remove_file(&second).ok();
    }
}
