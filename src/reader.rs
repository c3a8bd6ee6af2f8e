use std::io::{self, Write};

/// Prompts, reads one line from the controlling terminal, and keeps a small
/// in-process history list. Deliberately thin: no editing keys, no
/// persistence across runs (see the history builtin's Non-goal note).
pub struct Reader {
    history: Vec<String>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    pub fn new() -> Self {
        Reader { history: Vec::new() }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Print `prompt`, flush, and block for one line. `Ok(None)` means EOF.
    /// A `SIGINT`-interrupted read (`EINTR`) is retried after re-printing
    /// the prompt, so Ctrl-C just redraws the prompt instead of aborting
    /// the read loop.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            print!("{prompt}");
            io::stdout().flush()?;

            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    let trimmed = line.trim_end_matches('\n').to_string();
                    if !trimmed.trim().is_empty() {
                        self.history.push(trimmed.clone());
                    }
                    return Ok(Some(trimmed));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reader_has_empty_history() {
        let reader = Reader::new();
        assert!(reader.history().is_empty());
    }
}
