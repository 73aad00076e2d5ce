use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use tracing::debug;

use crate::error::PlanError;
use crate::types::{Pipeline, Stage};

const PIPE: &[u8] = b"|";
const INPUT: &[u8] = b"<";
const OUTPUT: &[u8] = b">";

fn is_operator(arg: &OsString) -> bool {
	matches!(arg.as_bytes(), PIPE | INPUT | OUTPUT)
}

/// Splits an argument vector into pipeline stages.
///
/// `|` ends the current stage, `<` names stage 0's input file and `>` names
/// the last stage's output file. Redirections found on any other stage are
/// rejected. An operator dangling at the end of the vector is dropped,
/// leaving the stages completed before it.
pub fn plan(args: Vec<OsString>) -> Result<Pipeline, PlanError> {
	let mut stages: Vec<Stage> = vec![];
	let mut current: Option<Stage> = None;
	let mut iter = args.into_iter().enumerate().peekable();

	while let Some((i, arg)) = iter.next() {
		match arg.as_bytes() {
			op @ (INPUT | OUTPUT) => {
				let op = if op == INPUT { "<" } else { ">" };
				let stage = match current.as_mut() {
					Some(stage) => stage,
					None => return Err(PlanError::EmptyStage { stage: stages.len() }),
				};
				let target = match iter.next() {
					None => {
						debug!(op, "dropping dangling redirection");
						break;
					},
					Some((_, t)) if is_operator(&t) => return Err(PlanError::MissingTarget { op }),
					Some((_, t)) => PathBuf::from(t),
				};
				if op == "<" {
					if stage.position != 0 {
						return Err(PlanError::MisplacedRedirect { op, stage: stage.position });
					}
					stage.input = Some(target);
				} else {
					stage.output = Some(target);
				}
			},
			PIPE => {
				let stage = match current.take() {
					Some(stage) => stage,
					None => return Err(PlanError::EmptyStage { stage: stages.len() }),
				};
				let dangling = iter.peek().is_none();
				if stage.output.is_some() && !dangling {
					return Err(PlanError::MisplacedRedirect { op: ">", stage: stage.position });
				}
				if dangling {
					debug!("dropping dangling pipe");
				}
				stages.push(stage);
			},
			_ => match current.as_mut() {
				Some(stage) => stage.argv.push(arg),
				None => current = Some(Stage {
					position: stages.len(),
					start: i,
					argv: vec![arg],
					input: None,
					output: None,
				}),
			},
		}
	}
	stages.extend(current);
	Ok(Pipeline { stages })
}
