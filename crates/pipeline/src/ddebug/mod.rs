//! Delta-debug fault localization of one cell.
//!
//! Each cell gets its own workspace holding the oracle scripts. The minimizer
//! runs there once per backend, strictly one backend after another since every
//! run writes the same output tree.

pub mod oracle;
pub mod parser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use numstab_primitives::{CellDescriptor, DdCellResult, LocalizationOutcome, LocalizationRecord};
use numstab_worker::{CancellationToken, ProcessOutcome, ProcessSpec, process};
use tracing::{debug, info, warn};

use crate::config::{Backend, RunConfig, Thresholds};

/// Classifies one minimizer invocation.
///
/// `output` is the combined stdout and stderr; the failure marker is matched
/// case-insensitively.
pub fn classify(code: Option<i32>, tree_exists: bool, output: &str, failure_marker: &str) -> LocalizationOutcome {
	if !tree_exists {
		return LocalizationOutcome::Failed;
	}
	if code == Some(0) {
		return LocalizationOutcome::Ok;
	}
	let marker = failure_marker.to_lowercase();
	if !marker.is_empty() && output.to_lowercase().contains(&marker) {
		LocalizationOutcome::Failed
	} else {
		LocalizationOutcome::OkWithWarning
	}
}

/// Drives the external minimizer over eligible cells.
#[derive(Debug, Clone)]
pub struct Localizer {
	minimizer: PathBuf,
	comparator: PathBuf,
	env_var: String,
	backends: Vec<Backend>,
	thresholds: Thresholds,
	program_args: Vec<String>,
	output_name: String,
	failure_marker: String,
	timeout: Duration,
}

impl Localizer {
	/// `minimizer` is the resolved minimizer path; `comparator` is the program
	/// the compare scripts call back into.
	pub fn new(minimizer: PathBuf, comparator: PathBuf, config: &RunConfig) -> Self {
		Self {
			minimizer,
			comparator,
			env_var: config.backend_env_var.clone(),
			backends: config.backends.clone(),
			thresholds: config.thresholds,
			program_args: config.program_args.clone(),
			output_name: config.minimizer_output.clone(),
			failure_marker: config.failure_marker.clone(),
			timeout: config.minimizer_timeout(),
		}
	}

	/// Prepares `workspace` and runs every backend on `binary`.
	///
	/// Always returns one record per backend; if the workspace cannot be
	/// prepared every backend is recorded as failed.
	pub async fn localize(&self, cell: CellDescriptor, binary: &Path, workspace: PathBuf, cancel: &CancellationToken) -> DdCellResult {
		let threshold = self.thresholds.for_configuration(&cell.modified_vars);
		let mut dd_results = Vec::with_capacity(self.backends.len());

		match oracle::write_scripts(&workspace, binary, &self.program_args, &self.comparator, threshold) {
			Ok(scripts) => {
				debug!(cell = %cell.config_id, run = %scripts.run.display(), compare = %scripts.compare.display(), threshold, "Oracle scripts ready");
				for backend in &self.backends {
					if cancel.is_cancelled() {
						dd_results.push(LocalizationRecord::failed(&backend.name, "cancelled", None, 0.0));
						continue;
					}
					let record = self.run_backend(&workspace, backend, cancel).await;
					info!(
						cell = %cell.config_id,
						backend = %backend.name,
						outcome = ?record.outcome,
						unstable = record.unstable_lines.len(),
						"Localization finished"
					);
					dd_results.push(record);
				}
			}
			Err(err) => {
				warn!(cell = %cell.config_id, workspace = %workspace.display(), error = %err, "Cannot prepare localization workspace");
				let reason = format!("cannot prepare workspace: {err}");
				dd_results.extend(self.backends.iter().map(|b| LocalizationRecord::failed(&b.name, reason.clone(), None, 0.0)));
			}
		}

		DdCellResult {
			cell,
			threshold,
			dd_workspace: workspace,
			dd_results,
		}
	}

	async fn run_backend(&self, workspace: &Path, backend: &Backend, cancel: &CancellationToken) -> LocalizationRecord {
		let tree = workspace.join(&self.output_name);
		if let Err(err) = remove_dir_if_present(&tree) {
			return LocalizationRecord::failed(&backend.name, format!("cannot remove stale {}: {err}", tree.display()), None, 0.0);
		}

		let spec = ProcessSpec::new(&self.minimizer)
			.arg(format!("./{}", oracle::RUN_SCRIPT))
			.arg(format!("./{}", oracle::COMPARE_SCRIPT))
			.current_dir(workspace)
			.env(&self.env_var, &backend.env)
			.timeout(self.timeout);
		debug!(backend = %backend.name, minimizer = %self.minimizer.display(), workspace = %workspace.display(), "Invoking minimizer");

		let outcome = process::run(&spec, cancel).await;
		let duration = outcome.elapsed().as_secs_f64();
		let out = match outcome {
			ProcessOutcome::Exited(out) => out,
			ProcessOutcome::TimedOut { .. } => {
				return LocalizationRecord::failed(&backend.name, format!("timed out after {}s", self.timeout.as_secs()), None, duration);
			}
			ProcessOutcome::Cancelled { .. } => return LocalizationRecord::failed(&backend.name, "cancelled", None, duration),
			ProcessOutcome::SpawnFailed { reason, .. } => return LocalizationRecord::failed(&backend.name, reason, None, duration),
		};

		let log = workspace.join(format!("{}.log", backend.name));
		if let Err(err) = std::fs::write(&log, format!("{}{}", out.stdout, out.stderr)) {
			warn!(path = %log.display(), error = %err, "Cannot keep minimizer log");
		}

		let transcript = format!("{}\n{}", out.stdout, out.stderr);
		match classify(out.code, tree.is_dir(), &transcript, &self.failure_marker) {
			LocalizationOutcome::Failed => {
				let reason = if tree.is_dir() {
					format!("minimizer reported failure (exit status {})", describe_code(out.code))
				} else {
					format!("minimizer produced no {} tree (exit status {})", self.output_name, describe_code(out.code))
				};
				LocalizationRecord::failed(&backend.name, reason, out.code, duration)
			}
			outcome => {
				let parsed = parser::parse_tree(&tree);
				let note = (outcome == LocalizationOutcome::OkWithWarning)
					.then(|| format!("minimizer exited with status {} but produced output", describe_code(out.code)));
				self.keep_tree(&tree, backend);
				LocalizationRecord {
					backend: backend.name.clone(),
					success: true,
					outcome,
					unstable_lines: parsed.unstable_lines,
					ddmin_sets: parsed.ddmin_sets,
					stable_lines: parsed.stable_lines,
					returncode: out.code,
					duration,
					note,
					error: None,
				}
			}
		}
	}

	/// Moves the parsed tree to `<output>.<backend>` so the next backend starts clean.
	fn keep_tree(&self, tree: &Path, backend: &Backend) {
		let kept = tree.with_file_name(format!("{}.{}", self.output_name, backend.name));
		let moved = remove_dir_if_present(&kept).and_then(|()| std::fs::rename(tree, &kept));
		if let Err(err) = moved {
			warn!(from = %tree.display(), to = %kept.display(), error = %err, "Cannot keep minimizer output");
		}
	}
}

fn remove_dir_if_present(dir: &Path) -> std::io::Result<()> {
	match std::fs::remove_dir_all(dir) {
		Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
		_ => Ok(()),
	}
}

fn describe_code(code: Option<i32>) -> String {
	code.map_or_else(|| "signal".to_owned(), |c| c.to_string())
}

#[cfg(test)]
mod tests;
