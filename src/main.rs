use std::io;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pipesh::builtin::Outcome;
use pipesh::{eval, parser, plan, EvalResult};

const PROMPT: &[u8] = b"pipesh> ";

#[derive(Debug, Parser)]
#[command(name = "pipesh", version, about = "A tiny shell that runs pipelines")]
struct Cli {
	/// Print additional diagnostic information
	#[arg(short, long)]
	verbose: bool,

	/// Do not emit a command prompt
	#[arg(short = 'p', long)]
	no_prompt: bool,
}

fn init_logging(verbose: bool) {
	let default = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();
}

fn eval_line(line: &[u8]) -> Option<i32> {
	let pipeline = match plan(parser::tokenize(line)) {
		Ok(pipeline) => pipeline,
		Err(e) => {
			eprintln!("pipesh: {}", e);
			return None;
		},
	};
	match eval(&pipeline) {
		Ok(EvalResult::Nothing) => None,
		Ok(EvalResult::Builtin(Outcome::Status(_))) => None,
		Ok(EvalResult::Builtin(Outcome::Exit(code))) => Some(code),
		Ok(EvalResult::Done(job)) => {
			debug!(pgid = job.pgid.as_raw(), status = ?job.exit_code(), "pipeline finished");
			None
		},
		Err(e) => {
			eprintln!("pipesh: {}", e);
			None
		},
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if !cli.no_prompt {
			let _ = stdout.write_all(PROMPT);
		}
		let _ = stdout.flush();
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => return ExitCode::SUCCESS,
			Ok(_) => {},
			Err(e) => {
				eprintln!("pipesh: read error: {}", e);
				return ExitCode::FAILURE;
			},
		}
		if let Some(code) = eval_line(&line) {
			let _ = stdout.flush();
			return ExitCode::from(code as u8);
		}
	}
}
