//! Supervised execution of external programs.
//!
//! Every child runs in its own process group with piped output, an optional
//! wall-clock limit and a cancellation token. On timeout or cancellation the
//! whole group is killed, so shell wrappers cannot leave orphans behind.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Description of one external invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
	pub program: PathBuf,
	pub args: Vec<OsString>,
	pub cwd: Option<PathBuf>,
	/// Variables added to the inherited environment.
	pub env: BTreeMap<String, String>,
	pub timeout: Option<Duration>,
}

impl ProcessSpec {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			..Self::default()
		}
	}

	pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cwd = Some(dir.into());
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	pub fn timeout(mut self, limit: Duration) -> Self {
		self.timeout = Some(limit);
		self
	}

	fn display(&self) -> String {
		self.program.display().to_string()
	}
}

/// Captured result of a child that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
	/// Exit code, `None` when the child was terminated by a signal.
	pub code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
	pub elapsed: Duration,
}

impl ProcessOutput {
	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
	Exited(ProcessOutput),
	TimedOut { elapsed: Duration },
	Cancelled { elapsed: Duration },
	/// The program could not be started, or its output could not be collected.
	SpawnFailed { reason: String, elapsed: Duration },
}

impl ProcessOutcome {
	pub fn elapsed(&self) -> Duration {
		match self {
			Self::Exited(output) => output.elapsed,
			Self::TimedOut { elapsed } | Self::Cancelled { elapsed } | Self::SpawnFailed { elapsed, .. } => *elapsed,
		}
	}

	pub fn output(&self) -> Option<&ProcessOutput> {
		match self {
			Self::Exited(output) => Some(output),
			_ => None,
		}
	}
}

/// Runs `spec` to completion, timeout, or cancellation.
pub async fn run(spec: &ProcessSpec, cancel: &CancellationToken) -> ProcessOutcome {
	let start = Instant::now();

	let mut cmd = Command::new(&spec.program);
	cmd.args(&spec.args)
		.envs(&spec.env)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	if let Some(dir) = &spec.cwd {
		cmd.current_dir(dir);
	}

	#[cfg(unix)]
	cmd.process_group(0);

	let child = match cmd.spawn() {
		Ok(child) => child,
		Err(err) => {
			warn!(program = %spec.display(), error = %err, "Failed to spawn process");
			return ProcessOutcome::SpawnFailed {
				reason: err.to_string(),
				elapsed: start.elapsed(),
			};
		}
	};
	let pid = child.id();
	trace!(program = %spec.display(), pid, timeout = ?spec.timeout, "Process started");

	let deadline = async {
		match spec.timeout {
			Some(limit) => tokio::time::sleep(limit).await,
			None => std::future::pending().await,
		}
	};

	tokio::select! {
		result = child.wait_with_output() => match result {
			Ok(output) => {
				let output = ProcessOutput {
					code: output.status.code(),
					stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
					stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
					elapsed: start.elapsed(),
				};
				debug!(program = %spec.display(), code = ?output.code, elapsed_ms = output.elapsed.as_millis() as u64, "Process exited");
				ProcessOutcome::Exited(output)
			}
			Err(err) => ProcessOutcome::SpawnFailed {
				reason: err.to_string(),
				elapsed: start.elapsed(),
			},
		},
		() = deadline => {
			kill_group(pid);
			warn!(program = %spec.display(), timeout = ?spec.timeout, "Process timed out");
			ProcessOutcome::TimedOut { elapsed: start.elapsed() }
		}
		() = cancel.cancelled() => {
			kill_group(pid);
			debug!(program = %spec.display(), "Process cancelled");
			ProcessOutcome::Cancelled { elapsed: start.elapsed() }
		}
	}
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
	use nix::sys::signal::{Signal, killpg};
	use nix::unistd::Pid;

	let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
		return;
	};
	if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
		trace!(pid, error = %err, "Process group already gone");
	}
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
