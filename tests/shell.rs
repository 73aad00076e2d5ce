use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

struct ShellHandler {
	args: Vec<&'static str>,
}

impl ShellHandler {
	fn new() -> ShellHandler {
		ShellHandler { args: vec!["-p"] }
	}

	fn with_prompt() -> ShellHandler {
		ShellHandler { args: vec![] }
	}

	fn run(&self, input: &str) -> Output {
		let mut child = Command::new(env!("CARGO_BIN_EXE_pipesh"))
			.args(&self.args)
			.env_remove("RUST_LOG")
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.unwrap();
		child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
		child.wait_with_output().unwrap()
	}
}

fn stdout(output: &Output) -> String {
	String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn prompt() {
	let output = ShellHandler::with_prompt().run("");
	assert_eq!(stdout(&output), "pipesh> ");
	assert!(output.status.success());
}

#[test]
fn single_stage_inherits_stdout() {
	let output = ShellHandler::new().run("echo hello\n");
	assert_eq!(stdout(&output), "hello\n");
}

#[test]
fn two_stage_pipeline() {
	let output = ShellHandler::new().run("echo hi | tr a-z A-Z\n");
	assert_eq!(stdout(&output), "HI\n");
}

#[test]
fn stages_read_shell_stdin_only_when_asked() {
	let output = ShellHandler::new().run("echo first\necho second | cat\n");
	assert_eq!(stdout(&output), "first\nsecond\n");
}

#[test]
fn redirected_three_stage_pipeline() {
	let dir = tempfile::tempdir().unwrap();
	let infile = dir.path().join("infile");
	let outfile = dir.path().join("outfile");
	fs::write(&infile, "b\na\nc\na\nb\n").unwrap();
	let line = format!("cat < {} | sort | uniq > {}\n", infile.display(), outfile.display());
	let output = ShellHandler::new().run(&line);
	assert_eq!(stdout(&output), "");
	assert_eq!(fs::read_to_string(&outfile).unwrap(), "a\nb\nc\n");
}

#[test]
fn dangling_pipe_runs_complete_stage() {
	let output = ShellHandler::new().run("echo a |\n");
	assert_eq!(stdout(&output), "a\n");
}

#[test]
fn errors_do_not_end_the_shell() {
	let output = ShellHandler::new().run("echo a | | cat\necho a | cat < f\npipesh-test-no-such-program\necho ok\n");
	assert_eq!(stdout(&output), "ok\n");
	let err = stderr(&output);
	assert!(err.contains("empty command"), "{}", err);
	assert!(err.contains("'<' is not allowed on stage 1"), "{}", err);
	assert!(err.contains("pipesh-test-no-such-program"), "{}", err);
}

#[test]
fn quit_stops_reading() {
	let output = ShellHandler::new().run("echo before\nquit\necho after\n");
	assert_eq!(stdout(&output), "before\n");
	assert!(output.status.success());
}

#[test]
fn exit_status() {
	let output = ShellHandler::new().run("exit 3\n");
	assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cd_changes_directory_for_later_stages() {
	let dir = tempfile::tempdir().unwrap();
	let dir = dir.path().canonicalize().unwrap();
	let output = ShellHandler::new().run(&format!("cd {}\npwd\n", dir.display()));
	assert_eq!(stdout(&output), format!("{}\n", dir.display()));
}

#[test]
fn quoted_arguments() {
	let output = ShellHandler::new().run("echo 'a  b' | cat\n");
	assert_eq!(stdout(&output), "a  b\n");
}
