use std::env;
use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

use tracing::debug;

use crate::types::Pipeline;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
	/// Keep reading commands; the built-in finished with this status.
	Status(i32),
	/// Leave the shell with this status.
	Exit(i32),
}

pub fn builtin_cd(args: &[OsString]) -> Outcome {
	let dir = match args.first() {
		Some(dir) => dir.clone(),
		None => match env::var_os("HOME") {
			Some(home) => home,
			None => {
				eprintln!("pipesh: cd: HOME not set");
				return Outcome::Status(1);
			},
		},
	};
	match env::set_current_dir(&dir) {
		Ok(()) => Outcome::Status(0),
		Err(e) => {
			eprintln!("pipesh: cd: {}: {}", dir.to_string_lossy(), e);
			Outcome::Status(1)
		},
	}
}

pub fn builtin_exit(args: &[OsString]) -> Outcome {
	match args.first() {
		None => Outcome::Exit(0),
		Some(code) => match code.to_str().and_then(|c| c.parse().ok()) {
			Some(code) => Outcome::Exit(code),
			None => {
				eprintln!("pipesh: exit: {}: numeric argument required", code.to_string_lossy());
				Outcome::Exit(2)
			},
		},
	}
}

pub fn match_builtin(name: &[u8]) -> Option<fn(&[OsString]) -> Outcome> {
	match name {
		b"cd" => Some(builtin_cd),
		b"exit" | b"quit" => Some(builtin_exit),
		_ => None,
	}
}

/// Runs the line as a built-in if it is a single built-in command without
/// redirection. Built-in names inside a longer pipeline are looked up as
/// ordinary programs.
pub fn try_builtin(pipeline: &Pipeline) -> Option<Outcome> {
	if pipeline.len() != 1 {
		return None;
	}
	let stage = &pipeline.stages[0];
	if stage.input.is_some() || stage.output.is_some() {
		return None;
	}
	let (name, args) = stage.argv.split_first()?;
	let builtin = match_builtin(name.as_bytes())?;
	debug!(name = ?name, "running built-in");
	Some(builtin(args))
}
