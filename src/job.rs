use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Active, Stopped, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) => State::Terminated,
			WaitStatus::Signaled(..) => State::Terminated,
			WaitStatus::Stopped(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceSyscall(..) => State::Stopped,
			WaitStatus::Continued(..) => State::Active,
			WaitStatus::StillAlive => State::Active,
		}
	}

	/// Shell-style status: the exit code, or 128 plus the terminating signal.
	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

/// The processes of one launched pipeline, all in process group `pgid`.
#[derive(Debug)]
pub struct Job {
	pub pgid: Pid,
	pub processes: Vec<Process>,
}

enum Reaped {
	One,
	Pending,
	Exhausted,
}

impl Job {
	pub fn state(&self) -> State {
		self.processes.iter().map(|pr| pr.status.state()).min().unwrap_or(State::Terminated)
	}

	pub fn pids(&self) -> Vec<Pid> {
		self.processes.iter().map(|pr| pr.pid).collect()
	}

	/// Status of the last stage, which is the status of the pipeline.
	pub fn exit_code(&self) -> Option<i32> {
		self.processes.last().and_then(|pr| pr.status.code())
	}

	fn record(&mut self, status: WaitStatus) {
		let pid = match status.pid() {
			Some(pid) => pid,
			None => return,
		};
		match self.processes.iter_mut().find(|pr| pr.pid == pid) {
			Some(pr) => {
				debug!(pid = pid.as_raw(), ?status, "reaped");
				pr.status = status;
			},
			None => warn!(pid = pid.as_raw(), "reaped a process this job does not own"),
		}
	}

	fn reap_one(&mut self, flags: Option<WaitPidFlag>) -> nix::Result<Reaped> {
		match waitpid(Pid::from_raw(-self.pgid.as_raw()), flags) {
			Ok(WaitStatus::StillAlive) => Ok(Reaped::Pending),
			Ok(status) => {
				self.record(status);
				Ok(Reaped::One)
			},
			Err(Errno::EINTR) => Ok(Reaped::One),
			Err(Errno::ECHILD) => Ok(Reaped::Exhausted),
			Err(e) => Err(e),
		}
	}

	/// Blocks until every process in the group has been reaped.
	///
	/// Interrupted waits are retried; the loop ends only once the kernel
	/// reports that no child is left in the group.
	pub fn wait(&mut self) -> nix::Result<()> {
		loop {
			match self.reap_one(None)? {
				Reaped::One | Reaped::Pending => continue,
				Reaped::Exhausted => return Ok(()),
			}
		}
	}

	/// Like `wait`, but gives up after `timeout`. Returns whether the group
	/// was fully reaped; statuses collected so far are kept either way.
	pub fn wait_timeout(&mut self, timeout: Duration) -> nix::Result<bool> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.reap_one(Some(WaitPidFlag::WNOHANG))? {
				Reaped::One => continue,
				Reaped::Exhausted => return Ok(true),
				Reaped::Pending => {
					let now = Instant::now();
					if now >= deadline {
						return Ok(false);
					}
					sleep(POLL_INTERVAL.min(deadline - now));
				},
			}
		}
	}

	/// Sends `signal` to every process in the group.
	pub fn signal(&self, signal: Signal) -> nix::Result<()> {
		debug!(pgid = self.pgid.as_raw(), signal = signal.as_str(), "signalling job");
		killpg(self.pgid, signal)
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { pgid: Pid::from_raw(0), processes: Vec::with_capacity(size_hint) }
		}
	}

	pub fn is_empty(&self) -> bool {
		self.imp.processes.is_empty()
	}

	/// Forks a process that joins this job's group. The first fork founds
	/// the group; both parent and child call `setpgid` so the membership holds
	/// whichever of them runs first.
	///
	/// # Safety
	///
	/// Same contract as `nix::unistd::fork`: the child may only perform
	/// async-signal-safe work before it execs or exits.
	pub unsafe fn push_fork(&mut self) -> nix::Result<ForkResult> {
		let job = &mut self.imp;

		let r = unistd::fork()?;
		match r {
			ForkResult::Parent { child } => {
				if job.processes.is_empty() {
					job.pgid = child;
				}
				if let Err(e) = unistd::setpgid(child, job.pgid) {
					// EACCES once the child has exec'd; it joined by itself.
					debug!(pid = child.as_raw(), error = %e, "setpgid from parent failed");
				}
				job.processes.push(Process { pid: child, status: WaitStatus::StillAlive });
			},
			ForkResult::Child => {
				let _ = unistd::setpgid(Pid::from_raw(0), job.pgid);
			},
		}
		Ok(r)
	}

	pub fn build(self) -> Job {
		self.imp
	}
}
