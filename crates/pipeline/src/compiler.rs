//! Instrumented compiler invocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use numstab_primitives::{CompilationRecord, OptLevel};
use numstab_worker::{CancellationToken, ProcessOutcome, ProcessSpec, process};
use tracing::{debug, warn};

use crate::config::RunConfig;

const FASTMATH_FLAG: &str = "-ffast-math";

/// Compiler command line shared by every cell of a run.
#[derive(Debug, Clone)]
pub struct Compiler {
	program: PathBuf,
	debug_flags: Vec<String>,
	extra_flags: Vec<String>,
	timeout: Duration,
}

impl Compiler {
	/// `program` is the resolved compiler path; flags and timeout come from `config`.
	pub fn new(program: PathBuf, config: &RunConfig) -> Self {
		Self {
			program,
			debug_flags: config.debug_flags.clone(),
			extra_flags: config.extra_flags.clone(),
			timeout: config.compile_timeout(),
		}
	}

	/// `-O<n> [-ffast-math] <debug flags> <source> -o <output> <extra flags>`.
	pub fn args(&self, source: &Path, output: &Path, opt_level: OptLevel, fastmath: bool) -> Vec<OsString> {
		let mut args: Vec<OsString> = vec![opt_level.flag().into()];
		if fastmath {
			args.push(FASTMATH_FLAG.into());
		}
		args.extend(self.debug_flags.iter().map(OsString::from));
		args.push(source.into());
		args.push("-o".into());
		args.push(output.into());
		args.extend(self.extra_flags.iter().map(OsString::from));
		args
	}

	/// Compiles `source` into `output`.
	///
	/// Success requires a zero exit status and `output` existing afterwards.
	/// Timeouts and spawn failures are recorded with return code `-1`.
	pub async fn compile(&self, source: &Path, output: &Path, opt_level: OptLevel, fastmath: bool, cancel: &CancellationToken) -> CompilationRecord {
		if let Some(dir) = output.parent()
			&& let Err(err) = std::fs::create_dir_all(dir)
		{
			return failure(-1, String::new(), String::new(), 0.0, format!("cannot create {}: {err}", dir.display()), false);
		}

		let spec = ProcessSpec::new(&self.program).args(self.args(source, output, opt_level, fastmath)).timeout(self.timeout);
		debug!(compiler = %self.program.display(), args = ?spec.args, "Invoking compiler");

		let outcome = process::run(&spec, cancel).await;
		let elapsed = outcome.elapsed().as_secs_f64();
		match outcome {
			ProcessOutcome::Exited(out) => {
				let code = out.code.unwrap_or(-1);
				if out.success() && output.exists() {
					CompilationRecord {
						success: true,
						binary_path: Some(output.to_path_buf()),
						returncode: code,
						stdout: out.stdout,
						stderr: out.stderr,
						compile_time: elapsed,
						error_message: None,
						timed_out: false,
					}
				} else {
					let message = if out.success() {
						format!("compiler exited 0 but {} was not created", output.display())
					} else if out.stderr.trim().is_empty() {
						format!("compiler exited with status {code}")
					} else {
						out.stderr.trim().to_owned()
					};
					failure(code, out.stdout, out.stderr, elapsed, message, false)
				}
			}
			ProcessOutcome::TimedOut { .. } => {
				warn!(source = %source.display(), timeout_secs = self.timeout.as_secs(), "Compilation timed out");
				failure(-1, String::new(), String::new(), elapsed, format!("Compilation timeout after {}s", self.timeout.as_secs()), true)
			}
			ProcessOutcome::Cancelled { .. } => failure(-1, String::new(), String::new(), elapsed, "Compilation cancelled".into(), false),
			ProcessOutcome::SpawnFailed { reason, .. } => failure(-1, String::new(), String::new(), elapsed, format!("failed to run compiler: {reason}"), false),
		}
	}
}

fn failure(returncode: i32, stdout: String, stderr: String, compile_time: f64, message: String, timed_out: bool) -> CompilationRecord {
	CompilationRecord {
		success: false,
		binary_path: None,
		returncode,
		stdout,
		stderr,
		compile_time,
		error_message: Some(message),
		timed_out,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn compiler(program: &str) -> Compiler {
		Compiler::new(PathBuf::from(program), &RunConfig::default())
	}

	#[test]
	fn command_line_always_requests_debug_support() {
		let args = compiler("verificarlo").args(Path::new("v/src.c"), Path::new("b/binary"), OptLevel::O3, true);
		let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
		assert_eq!(args, ["-O3", "-ffast-math", "-g", "--ddebug", "v/src.c", "-o", "b/binary", "-lm"]);

		let plain = compiler("verificarlo").args(Path::new("s.c"), Path::new("out"), OptLevel::O0, false);
		assert!(!plain.iter().any(|a| a == FASTMATH_FLAG));
		assert!(plain.iter().any(|a| a == "--ddebug"));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn zero_exit_without_artifact_is_a_failure() {
		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("cell/binary");
		let record = compiler("true").compile(Path::new("src.c"), &output, OptLevel::O0, false, &CancellationToken::new()).await;
		assert!(!record.success);
		assert_eq!(record.returncode, 0);
		assert!(record.binary_path.is_none());
		assert!(record.error_message.unwrap().contains("was not created"));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn missing_compiler_is_recorded() {
		let dir = tempfile::tempdir().unwrap();
		let record = compiler("/nonexistent/verificarlo")
			.compile(Path::new("src.c"), &dir.path().join("binary"), OptLevel::O1, false, &CancellationToken::new())
			.await;
		assert!(!record.success);
		assert_eq!(record.returncode, -1);
		assert!(!record.timed_out);
	}
}
