use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::manifest::CellDescriptor;

/// Outcome of compiling one cell.
///
/// `binary_path` is only populated when `success` is true, and success
/// requires both a zero exit status and the artifact existing on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationRecord {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub binary_path: Option<PathBuf>,
	/// Compiler exit code, `-1` when the compiler timed out, failed to spawn or was killed.
	pub returncode: i32,
	pub stdout: String,
	pub stderr: String,
	/// Wall-clock compile duration in seconds.
	pub compile_time: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	#[serde(default)]
	pub timed_out: bool,
}

/// Classification of a cell's exact-arithmetic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidityReason {
	#[serde(rename = "valid")]
	Valid,
	#[serde(rename = "NaN")]
	Nan,
	#[serde(rename = "Inf")]
	Inf,
	/// The binary did not run to completion or its last output line was not a number.
	#[serde(rename = "execution_failed")]
	ExecutionFailed,
}

impl ValidityReason {
	/// Classifies a parsed scalar result.
	pub fn classify(value: f64) -> Self {
		if value.is_nan() {
			Self::Nan
		} else if value.is_infinite() {
			Self::Inf
		} else {
			Self::Valid
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Valid => "valid",
			Self::Nan => "NaN",
			Self::Inf => "Inf",
			Self::ExecutionFailed => "execution_failed",
		}
	}
}

/// How far validation got for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
	Completed,
	ExecutionFailed,
	SkippedCompilationFailed,
}

/// Outcome of running one cell's binary under the exact-arithmetic backend.
///
/// Every constructor keeps `skip_ddebug == !valid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
	pub validation_status: ValidationStatus,
	pub valid: bool,
	/// Set whenever the cell must not reach fault localization.
	pub skip_ddebug: bool,
	/// Textual form of the observed scalar (non-finite values have no JSON number form).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output_value: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub validity_reason: Option<ValidityReason>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub run_returncode: Option<i32>,
	#[serde(default)]
	pub run_stdout: String,
	#[serde(default)]
	pub run_stderr: String,
}

impl ValidationRecord {
	/// Record for a cell whose compilation failed.
	pub fn skipped_compilation_failed() -> Self {
		Self {
			validation_status: ValidationStatus::SkippedCompilationFailed,
			valid: false,
			skip_ddebug: true,
			output_value: None,
			validity_reason: None,
			run_returncode: None,
			run_stdout: String::new(),
			run_stderr: String::new(),
		}
	}

	/// Record for a run that timed out, failed to start, or printed no number.
	pub fn execution_failed(returncode: Option<i32>, stdout: String, stderr: String) -> Self {
		Self {
			validation_status: ValidationStatus::ExecutionFailed,
			valid: false,
			skip_ddebug: true,
			output_value: None,
			validity_reason: Some(ValidityReason::ExecutionFailed),
			run_returncode: returncode,
			run_stdout: stdout,
			run_stderr: stderr,
		}
	}

	/// Record for a run whose last output line parsed as `value`.
	pub fn observed(value: f64, returncode: Option<i32>, stdout: String, stderr: String) -> Self {
		let reason = ValidityReason::classify(value);
		let valid = reason == ValidityReason::Valid;
		Self {
			validation_status: ValidationStatus::Completed,
			valid,
			skip_ddebug: !valid,
			output_value: Some(value.to_string()),
			validity_reason: Some(reason),
			run_returncode: returncode,
			run_stdout: stdout,
			run_stderr: stderr,
		}
	}

	/// Returns `true` when the cell may proceed to fault localization.
	pub fn is_eligible(&self) -> bool {
		self.valid && !self.skip_ddebug
	}
}

/// Tri-state interpretation of one minimizer invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizationOutcome {
	/// Zero exit status and an output tree.
	Ok,
	/// Non-zero exit status, but an output tree without a failure marker.
	OkWithWarning,
	Failed,
}

impl LocalizationOutcome {
	pub const fn is_success(self) -> bool {
		!matches!(self, Self::Failed)
	}
}

/// One minimal unstable set reported by the minimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdminSet {
	pub set_name: String,
	pub lines: BTreeSet<u32>,
}

/// Fault-localization result for one `(cell, backend)` pair.
///
/// Recorded even on failure, with an empty line set and `success == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationRecord {
	pub backend: String,
	pub success: bool,
	pub outcome: LocalizationOutcome,
	/// Canonical, deduplicated, sorted unstable source lines.
	pub unstable_lines: BTreeSet<u32>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub ddmin_sets: Vec<DdminSet>,
	#[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
	pub stable_lines: BTreeSet<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub returncode: Option<i32>,
	/// Wall-clock minimizer duration in seconds.
	#[serde(default)]
	pub duration: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub note: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl LocalizationRecord {
	/// Failure record for `backend`.
	pub fn failed(backend: impl Into<String>, error: impl Into<String>, returncode: Option<i32>, duration: f64) -> Self {
		Self {
			backend: backend.into(),
			success: false,
			outcome: LocalizationOutcome::Failed,
			unstable_lines: BTreeSet::new(),
			ddmin_sets: Vec::new(),
			stable_lines: BTreeSet::new(),
			returncode,
			duration,
			note: None,
			error: Some(error.into()),
		}
	}
}

/// Terminal classification of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
	/// Localization succeeded on at least one backend and found no unstable line.
	Stable,
	/// At least one successful backend reported unstable lines.
	Unstable,
	/// Exact-arithmetic output was non-finite or unparseable.
	SkippedInvalidOutput,
	CompilationFailed,
	/// Every backend failed.
	LocalizationFailed,
	/// Eligible, but no localization result has been recorded yet.
	PendingLocalization,
}

/// Per-backend slice of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendBreakdown {
	pub backend: String,
	pub outcome: LocalizationOutcome,
	pub unstable_lines: BTreeSet<u32>,
}

/// Merged view of one cell across every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
	#[serde(flatten)]
	pub cell: CellDescriptor,
	pub status: CellStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub validity_reason: Option<ValidityReason>,
	/// Union of unstable lines across successful backends.
	pub unstable_lines: BTreeSet<u32>,
	pub backends_succeeded: usize,
	pub backends_total: usize,
	#[serde(default)]
	pub per_backend: Vec<BackendBreakdown>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn non_finite_values_skip_localization() {
		let nan = ValidationRecord::observed(f64::NAN, Some(0), "nan\n".into(), String::new());
		assert!(!nan.valid);
		assert!(nan.skip_ddebug);
		assert_eq!(nan.validity_reason, Some(ValidityReason::Nan));
		assert!(!nan.is_eligible());

		let inf = ValidationRecord::observed(f64::NEG_INFINITY, Some(0), "-inf\n".into(), String::new());
		assert_eq!(inf.validity_reason, Some(ValidityReason::Inf));
		assert!(inf.skip_ddebug);

		let ok = ValidationRecord::observed(3.5, Some(0), "3.5\n".into(), String::new());
		assert!(ok.is_eligible());
	}

	#[test]
	fn validity_reason_wire_names() {
		assert_eq!(serde_json::to_string(&ValidityReason::Nan).unwrap(), "\"NaN\"");
		assert_eq!(serde_json::to_string(&ValidityReason::ExecutionFailed).unwrap(), "\"execution_failed\"");
	}

	#[test]
	fn failed_localization_has_no_lines() {
		let record = LocalizationRecord::failed("rr", "timed out", None, 600.0);
		assert!(!record.success);
		assert!(record.unstable_lines.is_empty());
		assert_eq!(record.outcome, LocalizationOutcome::Failed);
	}
}
