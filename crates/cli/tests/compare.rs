#![allow(unused_crate_dependencies)]
#![cfg(unix)]

//! The compare script generated for the minimizer, driving the built binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use numstab_pipeline::ddebug::oracle::{OUTPUT_FILE, STAT_FILE, write_scripts};
use rstest::rstest;

const NUMSTAB: &str = env!("CARGO_BIN_EXE_numstab");

fn run_dir(root: &Path, name: &str, output: &str) -> PathBuf {
	let dir = root.join(name);
	std::fs::create_dir_all(&dir).unwrap();
	std::fs::write(dir.join(OUTPUT_FILE), output).unwrap();
	dir
}

/// Exit status of the generated `ddCmp` for the given run outputs.
fn judge(reference: &str, current: &str, threshold: f64) -> (bool, String) {
	let dir = tempfile::tempdir().unwrap();
	let scripts = write_scripts(&dir.path().join("cell"), &dir.path().join("prog"), &[], Path::new(NUMSTAB), threshold).unwrap();
	let reference = run_dir(dir.path(), "ref", reference);
	let current = run_dir(dir.path(), "cur", current);

	let status = Command::new(&scripts.compare).arg(&reference).arg(&current).current_dir(dir.path().join("cell")).status().unwrap();
	let stat = std::fs::read_to_string(current.join(STAT_FILE)).unwrap();
	(status.success(), stat)
}

#[rstest]
#[case::identical("3.14159265358979\n", "3.14159265358979\n", 1e-6, true)]
#[case::identical_at_smallest_threshold("3.14159265358979\n", "3.14159265358979\n", f64::MIN_POSITIVE, true)]
#[case::two_percent_at_baseline("1.0\n", "1.02\n", 1e-6, false)]
#[case::two_percent_at_reduced("1.0\n", "1.02\n", 1e-2, false)]
#[case::two_percent_at_loose("1.0\n", "1.02\n", 0.05, true)]
#[case::both_infinite("inf\n", "inf\n", 1e-2, false)]
fn compare_script_exit_status(#[case] reference: &str, #[case] current: &str, #[case] threshold: f64, #[case] stable: bool) {
	let (success, stat) = judge(reference, current, threshold);
	assert_eq!(success, stable, "res.stat: {stat}");
	assert!(stat.starts_with("reference = "), "{stat}");
}

#[test]
fn unparseable_output_fails_and_logs_the_error() {
	let (success, stat) = judge("1.0\n", "Segmentation fault\n", 1e-2);
	assert!(!success);
	assert!(stat.starts_with("error = "), "{stat}");
}

#[test]
fn missing_output_directory_fails() {
	let dir = tempfile::tempdir().unwrap();
	let reference = run_dir(dir.path(), "ref", "1.0\n");
	let current = dir.path().join("cur");
	std::fs::create_dir_all(&current).unwrap();

	let status = Command::new(NUMSTAB).arg("compare").arg("--threshold").arg("1e-2").arg(&reference).arg(&current).status().unwrap();
	assert!(!status.success());
}
