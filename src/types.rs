use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
	pub position: usize,
	/// Index of the stage's first token in the planned argument vector.
	pub start: usize,
	pub argv: Vec<OsString>,
	pub input: Option<PathBuf>,
	pub output: Option<PathBuf>,
}

impl Stage {
	pub fn name(&self) -> &OsString {
		&self.argv[0]
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
}

impl Pipeline {
	pub fn len(&self) -> usize {
		self.stages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.stages.is_empty()
	}

	pub fn is_first(&self, i: usize) -> bool {
		i == 0
	}

	pub fn is_last(&self, i: usize) -> bool {
		i + 1 == self.stages.len()
	}
}
