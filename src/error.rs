use std::ffi;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
	#[error("'{op}' is not allowed on stage {stage}")]
	MisplacedRedirect { op: &'static str, stage: usize },
	#[error("missing file name after '{op}'")]
	MissingTarget { op: &'static str },
	#[error("empty command in pipeline at stage {stage}")]
	EmptyStage { stage: usize },
}

#[derive(Debug, Error)]
pub enum LaunchError {
	#[error("Nix error: {0}")]
	NixError(#[from] nix::Error),
	#[error("Nul char error: {0}")]
	NulError(#[from] ffi::NulError),
	#[error("pipeline has no stages")]
	Empty,
	#[error("stage {0} has no program")]
	NoProgram(usize),
}
