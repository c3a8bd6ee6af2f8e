//! Exit-code propagation and PATH-search behavior, driven through `-c`
//! since job-control terminal transfer needs a controlling terminal that
//! a piped test process doesn't have (verified separately by the inline
//! unit tests in `job_control.rs`, `jobs.rs`, and `executor.rs`).

use std::process::Command;

fn run(command: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jsh"))
        .arg("-c")
        .arg(command)
        .output()
        .expect("spawn jsh")
}

#[test]
fn foreground_exit_code_propagates_to_process_exit_status() {
    let output = run("sh -c 'exit 7'");
    assert_eq!(output.status.code(), Some(7));
}

#[cfg(unix)]
#[test]
fn foreground_signal_death_maps_to_128_plus_signal() {
    // The foreground child dies by SIGTERM; jsh translates that into its
    // own exit code (128 + 15) rather than dying by the signal itself.
    let output = run("sh -c 'kill -TERM $$'");
    assert_eq!(output.status.code(), Some(128 + 15));
}

#[test]
fn unknown_command_reports_not_found_and_exits_127() {
    let output = run("definitely_not_a_real_command_xyz");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(127));
    assert!(
        stderr.contains("definitely_not_a_real_command_xyz"),
        "stderr was: {stderr}"
    );
}

#[cfg(unix)]
#[test]
fn found_but_not_executable_reports_126() {
    let path = std::env::temp_dir().join(format!("jsh_noexec_{}", std::process::id()));
    std::fs::write(&path, "#!/bin/sh\necho should not run\n").unwrap();

    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o644);
    std::fs::set_permissions(&path, perms).unwrap();

    let output = run(&path.display().to_string());
    assert_eq!(output.status.code(), Some(126));
    std::fs::remove_file(&path).ok();
}

#[test]
fn absolute_path_bypasses_path_search() {
    let output = run("/bin/echo direct_path_hit");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("direct_path_hit"), "stdout was: {stdout}");
}
