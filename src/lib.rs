//! A small shell that runs pipelines of external programs.
//!
//! A command line goes through three steps: [`parser::tokenize`] splits it
//! into words, [`plan::plan`] groups the words into stages with their
//! redirections, and [`eval::eval`] launches the stages as one process group
//! connected by pipes and waits for all of them.

pub mod builtin;
pub mod error;
pub mod eval;
pub mod job;
pub mod parser;
pub mod plan;
pub mod types;

pub use error::{LaunchError, PlanError};
pub use eval::{eval, run, spawn, EvalResult};
pub use job::Job;
pub use plan::plan;
pub use types::{Pipeline, Stage};
