//! Exact-arithmetic output validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use numstab_primitives::ValidationRecord;
use numstab_worker::{CancellationToken, ProcessOutcome, ProcessSpec, process};
use tracing::debug;

use crate::config::RunConfig;

/// Parses the last non-empty line of `output` as a float.
///
/// Accepts the usual textual forms of non-finite values (`nan`, `-inf`,
/// `Infinity`, any case).
pub fn last_line_value(output: &str) -> Option<f64> {
	output.lines().map(str::trim).rfind(|line| !line.is_empty())?.parse().ok()
}

/// Runs cell binaries once under the exact-arithmetic backend.
#[derive(Debug, Clone)]
pub struct Validator {
	env_var: String,
	exact_backend: String,
	args: Vec<String>,
	timeout: Duration,
}

impl Validator {
	pub fn new(config: &RunConfig) -> Self {
		Self {
			env_var: config.backend_env_var.clone(),
			exact_backend: config.exact_backend.clone(),
			args: config.program_args.clone(),
			timeout: config.validation_timeout(),
		}
	}

	/// Executes `binary` in `workdir` and classifies its scalar result.
	pub async fn validate(&self, binary: &Path, workdir: Option<PathBuf>, cancel: &CancellationToken) -> ValidationRecord {
		let mut spec = ProcessSpec::new(binary).args(&self.args).env(&self.env_var, &self.exact_backend).timeout(self.timeout);
		spec.cwd = workdir;

		match process::run(&spec, cancel).await {
			ProcessOutcome::Exited(out) => match last_line_value(&out.stdout) {
				Some(value) => {
					debug!(binary = %binary.display(), value, code = ?out.code, "Observed exact-arithmetic result");
					ValidationRecord::observed(value, out.code, out.stdout, out.stderr)
				}
				None => ValidationRecord::execution_failed(out.code, out.stdout, out.stderr),
			},
			ProcessOutcome::TimedOut { .. } => {
				ValidationRecord::execution_failed(None, String::new(), format!("timed out after {}s", self.timeout.as_secs()))
			}
			ProcessOutcome::Cancelled { .. } => ValidationRecord::execution_failed(None, String::new(), "cancelled".into()),
			ProcessOutcome::SpawnFailed { reason, .. } => ValidationRecord::execution_failed(None, String::new(), reason),
		}
	}
}
