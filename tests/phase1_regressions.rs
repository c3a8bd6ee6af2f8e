//! End-to-end checks for pipeline construction and redirection, driven
//! through the `-c` non-interactive entry point so no controlling
//! terminal is required.

use std::process::Command;

fn run(command: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jsh"))
        .arg("-c")
        .arg(command)
        .output()
        .expect("spawn jsh")
}

#[test]
fn builtin_to_external_pipeline_outputs() {
    let output = run("echo hello | sort");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"), "stdout was: {stdout}");
}

#[test]
fn two_stage_pipeline_transforms_output() {
    let output = run("echo hello world | tr a-z A-Z");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HELLO WORLD"), "stdout was: {stdout}");
}

#[test]
fn output_redirection_writes_file() {
    let path = std::env::temp_dir().join(format!("jsh_redirect_out_{}", std::process::id()));
    let cmd = format!("echo redirected > {}", path.display());

    let output = run(&cmd);
    assert!(output.status.success(), "jsh exited non-zero: {:?}", output);

    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert!(contents.contains("redirected"), "file contents: {contents}");
    std::fs::remove_file(&path).ok();
}

#[test]
fn input_redirection_is_accepted() {
    let path = std::env::temp_dir().join(format!("jsh_redirect_in_{}", std::process::id()));
    std::fs::write(&path, "line one\nline two\n").unwrap();

    let cmd = format!("cat < {}", path.display());
    let output = run(&cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("line one"), "stdout was: {stdout}");
    assert!(stdout.contains("line two"), "stdout was: {stdout}");
    std::fs::remove_file(&path).ok();
}

#[test]
fn stdout_redirection_inside_a_pipeline_stage() {
    let path = std::env::temp_dir().join(format!("jsh_redirect_pipe_{}", std::process::id()));
    let cmd = format!("echo one two three | tr ' ' '\\n' > {}", path.display());

    let output = run(&cmd);
    assert!(output.status.success(), "jsh exited non-zero: {:?}", output);

    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert_eq!(contents.lines().count(), 3, "file contents: {contents}");
    std::fs::remove_file(&path).ok();
}
