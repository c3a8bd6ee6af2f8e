use libc::c_int;

/// Map a raw `waitpid` status word to shell-style exit code semantics:
/// `Some(code)` once the process has actually exited or been killed by a
/// signal (`128 + signal`), `None` while it is merely stopped or continued.
pub fn exit_code_from_status(status: c_int) -> Option<i32> {
    if unsafe { libc::WIFEXITED(status) } {
        return Some(unsafe { libc::WEXITSTATUS(status) });
    }
    if unsafe { libc::WIFSIGNALED(status) } {
        return Some(128 + unsafe { libc::WTERMSIG(status) });
    }
    None
}

/// True if the status word represents death by signal, with that signal
/// number — used by the `jobs`/shutdown report formatting (`killed ... by
/// signal K` vs `exited ..., status=K`).
pub fn terminating_signal(status: c_int) -> Option<i32> {
    if unsafe { libc::WIFSIGNALED(status) } {
        Some(unsafe { libc::WTERMSIG(status) })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(code: i32) -> c_int {
        (code & 0xff) << 8
    }

    fn signaled(sig: i32) -> c_int {
        sig & 0x7f
    }

    #[test]
    fn normal_exit_reports_its_code() {
        assert_eq!(exit_code_from_status(exited(0)), Some(0));
        assert_eq!(exit_code_from_status(exited(42)), Some(42));
    }

    #[test]
    fn signal_death_maps_to_128_plus_signal() {
        assert_eq!(
            exit_code_from_status(signaled(libc::SIGTERM)),
            Some(128 + libc::SIGTERM)
        );
    }

    #[test]
    fn terminating_signal_is_none_for_normal_exit() {
        assert_eq!(terminating_signal(exited(0)), None);
        assert_eq!(terminating_signal(signaled(libc::SIGKILL)), Some(libc::SIGKILL));
    }
}
