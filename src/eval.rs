use std::ffi::{CStr, CString};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult};
use tracing::{debug, warn};

use crate::builtin;
use crate::error::LaunchError;
use crate::job::{Job, JobBuilder};
use crate::types::Pipeline;

/// Exit status of a stage whose redirection or pipe setup failed.
pub const EXIT_SETUP_FAILED: i32 = 1;
/// Exit status of a stage whose program exists but could not be executed.
pub const EXIT_CANNOT_EXEC: i32 = 126;
/// Exit status of a stage whose program was not found.
pub const EXIT_NOT_FOUND: i32 = 127;

// Only raw syscalls below: this runs between fork and exec.
fn report(what: &[u8], e: Errno) {
	let parts: [&[u8]; 5] = [b"pipesh: ", what, b": ", e.desc().as_bytes(), b"\n"];
	for part in parts {
		unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr() as *const libc::c_void, part.len()) };
	}
}

fn child_exit(status: i32) -> ! {
	unsafe { libc::_exit(status) }
}

// Moves `fd` onto `to`. When they already coincide (the shell started with
// that stream closed) the descriptor is kept and only loses close-on-exec.
fn move_fd(fd: OwnedFd, to: RawFd) -> nix::Result<()> {
	if fd.as_raw_fd() == to {
		let fd = fd.into_raw_fd();
		if unsafe { libc::fcntl(fd, libc::F_SETFD, 0) } < 0 {
			return Err(Errno::last());
		}
		return Ok(());
	}
	unistd::dup2(fd.as_raw_fd(), to)?;
	Ok(())
}

fn redirect(path: &CStr, to: RawFd) -> nix::Result<()> {
	let flags = if to == libc::STDIN_FILENO {
		libc::O_RDONLY
	} else {
		libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC
	};
	let fd = unsafe { libc::open(path.as_ptr(), flags | libc::O_CLOEXEC, 0o666 as libc::c_uint) };
	if fd < 0 {
		return Err(Errno::last());
	}
	move_fd(unsafe { OwnedFd::from_raw_fd(fd) }, to)
}

fn redirect_or_exit(path: &CStr, to: RawFd) {
	if let Err(e) = redirect(path, to) {
		report(path.to_bytes(), e);
		child_exit(EXIT_SETUP_FAILED);
	}
}

fn connect_or_exit(fd: OwnedFd, to: RawFd) {
	if let Err(e) = move_fd(fd, to) {
		report(b"dup2", e);
		child_exit(EXIT_SETUP_FAILED);
	}
}

/// Everything a stage's child needs, converted before the fork.
struct Prepared {
	argv: Vec<CString>,
	input: Option<CString>,
	output: Option<CString>,
}

struct Wiring<'a> {
	input: Option<&'a CStr>,
	output: Option<&'a CStr>,
	pipe_stdin: Option<OwnedFd>,
	pipe_stdout: Option<OwnedFd>,
	spare: Option<OwnedFd>,
}

fn exec_stage(argv: &[CString], wiring: Wiring) -> ! {
	// The shell runs with SIGPIPE ignored; stages get the default back.
	let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
	if let Some(path) = wiring.input {
		redirect_or_exit(path, libc::STDIN_FILENO);
	}
	if let Some(path) = wiring.output {
		redirect_or_exit(path, libc::STDOUT_FILENO);
	}
	if let Some(fd) = wiring.pipe_stdin {
		connect_or_exit(fd, libc::STDIN_FILENO);
	}
	if let Some(fd) = wiring.pipe_stdout {
		connect_or_exit(fd, libc::STDOUT_FILENO);
	}
	drop(wiring.spare);

	let e = match unistd::execvp(&argv[0], argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	report(argv[0].to_bytes(), e);
	child_exit(if e == Errno::ENOENT { EXIT_NOT_FOUND } else { EXIT_CANNOT_EXEC })
}

fn to_cstring(path: &Path) -> Result<CString, LaunchError> {
	Ok(CString::new(path.as_os_str().as_bytes())?)
}

fn prepare(pipeline: &Pipeline, i: usize) -> Result<Prepared, LaunchError> {
	let stage = &pipeline.stages[i];
	if stage.argv.is_empty() {
		return Err(LaunchError::NoProgram(i));
	}
	let argv = stage.argv.iter().map(|a| CString::new(a.as_bytes())).collect::<Result<Vec<_>, _>>()?;
	if (!pipeline.is_first(i) && stage.input.is_some()) || (!pipeline.is_last(i) && stage.output.is_some()) {
		warn!(stage = i, "ignoring redirection on an inner stage");
	}
	let input = match stage.input {
		Some(ref path) if pipeline.is_first(i) => Some(to_cstring(path)?),
		_ => None,
	};
	let output = match stage.output {
		Some(ref path) if pipeline.is_last(i) => Some(to_cstring(path)?),
		_ => None,
	};
	Ok(Prepared { argv, input, output })
}

fn spawn_commands(pipeline: &Pipeline, prepared: &[Prepared], job_builder: &mut JobBuilder) -> Result<(), LaunchError> {
	let mut pipe_stdin: Option<OwnedFd> = None;
	for (i, stage) in pipeline.stages.iter().enumerate() {
		let (pipe_read, pipe_write) = if pipeline.is_last(i) {
			(None, None)
		} else {
			let (r, w) = unistd::pipe2(OFlag::O_CLOEXEC)?;
			(Some(r), Some(w))
		};

		match unsafe { job_builder.push_fork() }? {
			ForkResult::Parent { child } => {
				debug!(stage = i, pid = child.as_raw(), program = ?stage.name(), "spawned");
				// The child owns these now; the read end feeds the next stage.
				drop(pipe_stdin.take());
				drop(pipe_write);
				pipe_stdin = pipe_read;
			},
			ForkResult::Child => {
				let wiring = Wiring {
					input: prepared[i].input.as_deref(),
					output: prepared[i].output.as_deref(),
					pipe_stdin: pipe_stdin.take(),
					pipe_stdout: pipe_write,
					spare: pipe_read,
				};
				exec_stage(&prepared[i].argv, wiring);
			},
		}
	}
	Ok(())
}

/// Launches every stage of `pipeline` in one new process group and returns
/// without waiting.
///
/// If a pipe or fork fails part way, the stages already running are
/// terminated and reaped before the error is returned.
pub fn spawn(pipeline: &Pipeline) -> Result<Job, LaunchError> {
	if pipeline.is_empty() {
		return Err(LaunchError::Empty);
	}
	let prepared = (0 .. pipeline.len()).map(|i| prepare(pipeline, i)).collect::<Result<Vec<_>, _>>()?;

	let mut job_builder = JobBuilder::new(pipeline.len());
	if let Err(e) = spawn_commands(pipeline, &prepared, &mut job_builder) {
		debug!(error = %e, "pipeline construction failed");
		if !job_builder.is_empty() {
			let mut job = job_builder.build();
			// Started stages may be blocked reading the terminal.
			if let Err(e) = job.signal(Signal::SIGTERM) {
				debug!(error = %e, "terminating a partial pipeline failed");
			}
			if let Err(e) = job.wait() {
				warn!(error = %e, "reaping a partial pipeline failed");
			}
		}
		return Err(e);
	}
	let job = job_builder.build();
	debug!(pgid = job.pgid.as_raw(), stages = job.processes.len(), "pipeline running");
	Ok(job)
}

/// Launches `pipeline` and blocks until all of its stages have exited.
pub fn run(pipeline: &Pipeline) -> Result<Job, LaunchError> {
	let mut job = spawn(pipeline)?;
	job.wait()?;
	Ok(job)
}

#[derive(Debug)]
pub enum EvalResult {
	Nothing,
	Builtin(builtin::Outcome),
	Done(Job),
}

/// Runs a planned command line: nothing for an empty line, a built-in when
/// the line is a single built-in command, otherwise the full pipeline.
pub fn eval(pipeline: &Pipeline) -> Result<EvalResult, LaunchError> {
	if pipeline.is_empty() {
		return Ok(EvalResult::Nothing);
	}
	if let Some(outcome) = builtin::try_builtin(pipeline) {
		return Ok(EvalResult::Builtin(outcome));
	}
	run(pipeline).map(EvalResult::Done)
}
