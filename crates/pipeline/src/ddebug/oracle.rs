//! The deviation oracle and the scripts the minimizer drives it through.
//!
//! The minimizer calls `ddRun <dir>` to produce a run's output and
//! `ddCmp <reference> <current>` to judge two runs. The run script is plain
//! shell; the compare script re-enters this program's `compare` command so the
//! statistic lives in exactly one place.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::validator::last_line_value;

pub const RUN_SCRIPT: &str = "ddRun";
pub const COMPARE_SCRIPT: &str = "ddCmp";
/// Captured output of one run, inside the minimizer-supplied directory.
pub const OUTPUT_FILE: &str = "res.dat";
/// Comparison log written into the current run's directory.
pub const STAT_FILE: &str = "res.stat";

#[derive(Debug, Error)]
pub enum OracleError {
	#[error("cannot read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("no numeric value on the last line of {path}")]
	NoValue { path: PathBuf },
	#[error("cannot write {path}: {source}")]
	Log {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Relative deviation of two results: sample standard deviation of `{r, c}`
/// over the absolute value of their mean.
///
/// Identical finite values have deviation `0`; a zero mean with distinct
/// values is infinitely unstable. A non-finite value on either side yields NaN,
/// which no threshold accepts.
pub fn deviation(reference: f64, current: f64) -> f64 {
	if !reference.is_finite() || !current.is_finite() {
		return f64::NAN;
	}
	if reference == current {
		return 0.0;
	}
	// n = 2: sqrt(((r - m)^2 + (c - m)^2) / (n - 1)) == |r - c| / sqrt(2)
	let stddev = (reference - current).abs() / std::f64::consts::SQRT_2;
	let mean = (reference + current) / 2.0;
	stddev / mean.abs()
}

/// One reference/current judgement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
	pub reference: f64,
	pub current: f64,
	pub deviation: f64,
	pub threshold: f64,
}

impl Comparison {
	pub fn new(reference: f64, current: f64, threshold: f64) -> Self {
		Self {
			reference,
			current,
			deviation: deviation(reference, current),
			threshold,
		}
	}

	/// Stable iff the deviation is strictly below the threshold. NaN never is.
	pub fn is_stable(&self) -> bool {
		self.deviation < self.threshold
	}
}

impl fmt::Display for Comparison {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "reference = {} current = {} deviation = {}", self.reference, self.current, self.deviation)
	}
}

/// Compares the outputs in two run directories and logs the result into
/// `current_dir`.
///
/// Read and parse failures are logged as well before being returned.
pub fn evaluate(reference_dir: &Path, current_dir: &Path, threshold: f64) -> Result<Comparison, OracleError> {
	let stat = current_dir.join(STAT_FILE);
	let outcome = read_value(reference_dir).and_then(|r| read_value(current_dir).map(|c| Comparison::new(r, c, threshold)));
	let line = match &outcome {
		Ok(comparison) => format!("{comparison}\n"),
		Err(err) => format!("error = {err}\n"),
	};
	std::fs::write(&stat, line).map_err(|source| OracleError::Log { path: stat, source })?;
	outcome
}

fn read_value(dir: &Path) -> Result<f64, OracleError> {
	let path = dir.join(OUTPUT_FILE);
	let text = std::fs::read_to_string(&path).map_err(|source| OracleError::Read { path: path.clone(), source })?;
	last_line_value(&text).ok_or(OracleError::NoValue { path })
}

/// Locations of a cell's generated scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleScripts {
	pub run: PathBuf,
	pub compare: PathBuf,
}

/// Writes executable run and compare scripts into `workspace`.
///
/// `binary` and `comparator` are made absolute because the minimizer invokes
/// the scripts from inside the workspace.
pub fn write_scripts(workspace: &Path, binary: &Path, program_args: &[String], comparator: &Path, threshold: f64) -> io::Result<OracleScripts> {
	std::fs::create_dir_all(workspace)?;
	let binary = std::path::absolute(binary)?;
	let comparator = std::path::absolute(comparator)?;

	let mut invocation = shell_quote(&binary.to_string_lossy());
	for arg in program_args {
		invocation.push(' ');
		invocation.push_str(&shell_quote(arg));
	}

	let run = workspace.join(RUN_SCRIPT);
	std::fs::write(&run, format!("#!/bin/sh\nexec {invocation} > \"$1/{OUTPUT_FILE}\" 2>&1\n"))?;
	make_executable(&run)?;

	let compare = workspace.join(COMPARE_SCRIPT);
	std::fs::write(
		&compare,
		format!("#!/bin/sh\nexec {} compare --threshold {threshold:e} \"$1\" \"$2\"\n", shell_quote(&comparator.to_string_lossy())),
	)?;
	make_executable(&compare)?;

	Ok(OracleScripts { run, compare })
}

/// Single-quotes `word` for POSIX sh.
fn shell_quote(word: &str) -> String {
	format!("'{}'", word.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
	Ok(())
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn run_dir(root: &Path, name: &str, output: &str) -> PathBuf {
		let dir = root.join(name);
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join(OUTPUT_FILE), output).unwrap();
		dir
	}

	#[test]
	fn identical_outputs_never_deviate() {
		let dir = tempfile::tempdir().unwrap();
		let reference = run_dir(dir.path(), "ref", "3.14159265358979\n");
		let current = run_dir(dir.path(), "cur", "iter 3\n3.14159265358979\n");

		let comparison = evaluate(&reference, &current, f64::MIN_POSITIVE).unwrap();
		assert_eq!(comparison.deviation, 0.0);
		assert!(comparison.is_stable());

		let stat = std::fs::read_to_string(current.join(STAT_FILE)).unwrap();
		assert!(stat.starts_with("reference = 3.14159265358979 current = 3.14159265358979 deviation = 0"));
	}

	#[test]
	fn two_percent_drift_is_unstable_at_baseline_threshold() {
		let comparison = Comparison::new(1.0, 1.02, 1e-6);
		assert!((comparison.deviation - 0.014).abs() < 5e-4, "deviation = {}", comparison.deviation);
		assert!(!comparison.is_stable());
		assert!(!Comparison::new(1.0, 1.02, 1e-2).is_stable());
		assert!(Comparison::new(1.0, 1.02, 0.05).is_stable());
	}

	#[test]
	fn zero_mean_and_nan_are_unstable() {
		assert!(!Comparison::new(1.0, -1.0, 1e-2).is_stable());
		assert!(!Comparison::new(1.0, f64::NAN, 1e-2).is_stable());
	}

	#[test]
	fn non_finite_pairs_are_unstable() {
		for (r, c) in [(f64::INFINITY, f64::INFINITY), (f64::NEG_INFINITY, f64::NEG_INFINITY), (f64::INFINITY, 1.0)] {
			let comparison = Comparison::new(r, c, 1e-2);
			assert!(comparison.deviation.is_nan(), "deviation({r}, {c}) = {}", comparison.deviation);
			assert!(!comparison.is_stable());
		}
	}

	#[test]
	fn infinite_outputs_are_logged_as_unstable() {
		let dir = tempfile::tempdir().unwrap();
		let reference = run_dir(dir.path(), "ref", "inf\n");
		let current = run_dir(dir.path(), "cur", "inf\n");

		let comparison = evaluate(&reference, &current, 1e-2).unwrap();
		assert!(!comparison.is_stable());
		let stat = std::fs::read_to_string(current.join(STAT_FILE)).unwrap();
		assert!(stat.contains("deviation = NaN"), "{stat}");
	}

	#[test]
	fn unparseable_output_is_logged_and_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let reference = run_dir(dir.path(), "ref", "1.0\n");
		let current = run_dir(dir.path(), "cur", "Segmentation fault\n");

		let err = evaluate(&reference, &current, 1e-2).unwrap_err();
		assert!(matches!(err, OracleError::NoValue { .. }));
		let stat = std::fs::read_to_string(current.join(STAT_FILE)).unwrap();
		assert!(stat.starts_with("error = "));
	}

	#[test]
	fn missing_output_is_a_read_error() {
		let dir = tempfile::tempdir().unwrap();
		let reference = run_dir(dir.path(), "ref", "1.0\n");
		let current = dir.path().join("cur");
		std::fs::create_dir_all(&current).unwrap();
		assert!(matches!(evaluate(&reference, &current, 1e-2), Err(OracleError::Read { .. })));
	}

	#[test]
	fn quoting_survives_apostrophes() {
		assert_eq!(shell_quote("plain"), "'plain'");
		assert_eq!(shell_quote("it's"), r"'it'\''s'");
	}

	#[cfg(unix)]
	#[test]
	fn run_script_captures_all_output() {
		let dir = tempfile::tempdir().unwrap();
		let binary = dir.path().join("prog");
		std::fs::write(&binary, "#!/bin/sh\necho \"args: $*\"\necho warning >&2\necho 2.5\n").unwrap();
		make_executable(&binary).unwrap();

		let workspace = dir.path().join("cell");
		let scripts = write_scripts(&workspace, &binary, &["a b".into()], Path::new("/usr/bin/numstab"), 1e-2).unwrap();

		let out = dir.path().join("run1");
		std::fs::create_dir_all(&out).unwrap();
		let status = std::process::Command::new(&scripts.run).arg(&out).current_dir(&workspace).status().unwrap();
		assert!(status.success());

		let captured = std::fs::read_to_string(out.join(OUTPUT_FILE)).unwrap();
		assert!(captured.contains("args: a b"));
		assert!(captured.contains("warning"));
		assert_eq!(last_line_value(&captured), Some(2.5));

		let compare = std::fs::read_to_string(&scripts.compare).unwrap();
		assert!(compare.contains("'/usr/bin/numstab' compare --threshold 1e-2 \"$1\" \"$2\""));
	}

	proptest! {
		#[test]
		fn prop_deviation_is_symmetric(r in prop::num::f64::NORMAL, c in prop::num::f64::NORMAL) {
			let forward = deviation(r, c);
			let backward = deviation(c, r);
			prop_assert!(forward == backward || (forward.is_nan() && backward.is_nan()));
		}

		#[test]
		fn prop_deviation_is_non_negative(r in -1e6f64..1e6, c in -1e6f64..1e6) {
			let d = deviation(r, c);
			prop_assert!(d.is_nan() || d >= 0.0);
		}
	}
}
