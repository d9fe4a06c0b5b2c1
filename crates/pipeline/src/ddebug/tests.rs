use std::collections::BTreeSet;

use numstab_primitives::{CellId, OptLevel};
use rstest::rstest;

use super::*;

#[rstest]
#[case::clean(Some(0), true, "", LocalizationOutcome::Ok)]
#[case::warning(Some(1), true, "ddmin: 3 iterations", LocalizationOutcome::OkWithWarning)]
#[case::marked(Some(1), true, "DDMIN FAILED: reference run diverged", LocalizationOutcome::Failed)]
#[case::no_tree(Some(0), false, "", LocalizationOutcome::Failed)]
#[case::signal(None, true, "", LocalizationOutcome::OkWithWarning)]
fn minimizer_outcomes(#[case] code: Option<i32>, #[case] tree: bool, #[case] output: &str, #[case] expected: LocalizationOutcome) {
	assert_eq!(classify(code, tree, output, "failed"), expected);
}

#[test]
fn marker_is_ignored_on_clean_exit() {
	assert_eq!(classify(Some(0), true, "0 failed comparisons", "failed"), LocalizationOutcome::Ok);
}

fn cell(modified: &[&str]) -> CellDescriptor {
	let name = if modified.is_empty() { "baseline".to_owned() } else { format!("{}_float", modified.join("_")) };
	CellDescriptor {
		variant_name: name.clone(),
		variant_id: "variant_000".into(),
		modified_vars: modified.iter().map(|v| (*v).to_owned()).collect::<BTreeSet<_>>(),
		opt_level: OptLevel::O0,
		fastmath: false,
		config_id: CellId::new(&name, OptLevel::O0, false),
	}
}

#[cfg(unix)]
mod unix {
	use std::os::unix::fs::PermissionsExt;

	use super::*;

	fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
		let path = dir.join(name);
		std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
		path
	}

	fn localizer(minimizer: PathBuf, config: RunConfig) -> Localizer {
		Localizer::new(minimizer, PathBuf::from("/usr/bin/numstab"), &config)
	}

	const REPORTING_MINIMIZER: &str = r#"[ -x "$1" ] && [ -x "$2" ] || exit 3
mkdir -p dd.line/rddmin-cmp
case "$VFC_BACKENDS" in
  *cancellation*) : ;;
  *) printf '0x1: f at src.c:16\n0x2: f at src.c:17\n' > dd.line/rddmin-cmp/dd.line.exclude ;;
esac
echo "ddmin done"
"#;

	#[tokio::test]
	async fn one_record_per_backend() {
		let dir = tempfile::tempdir().unwrap();
		let minimizer = script(dir.path(), "vfc_ddebug", REPORTING_MINIMIZER);
		let binary = script(dir.path(), "binary", "echo 1.0\n");
		let workspace = dir.path().join("ddebug/ti_float_O0_nofastmath");

		let result = localizer(minimizer, RunConfig::default())
			.localize(cell(&["ti"]), &binary, workspace.clone(), &CancellationToken::new())
			.await;

		assert_eq!(result.threshold, 1e-2);
		let backends: Vec<&str> = result.dd_results.iter().map(|r| r.backend.as_str()).collect();
		assert_eq!(backends, ["rr", "mca", "cancellation"]);
		assert!(result.dd_results.iter().all(|r| r.outcome == LocalizationOutcome::Ok));
		assert_eq!(result.dd_results[0].unstable_lines.iter().copied().collect::<Vec<_>>(), [16, 17]);
		assert!(result.dd_results[2].unstable_lines.is_empty());

		assert!(workspace.join("ddRun").exists());
		assert!(workspace.join("ddCmp").exists());
		assert!(workspace.join("dd.line.rr/rddmin-cmp/dd.line.exclude").exists());
		assert!(!workspace.join("dd.line").exists());
		assert!(std::fs::read_to_string(workspace.join("mca.log")).unwrap().contains("ddmin done"));
	}

	#[tokio::test]
	async fn stale_tree_is_not_reinterpreted() {
		let dir = tempfile::tempdir().unwrap();
		let minimizer = script(dir.path(), "vfc_ddebug", "exit 0\n");
		let binary = script(dir.path(), "binary", "echo 1.0\n");
		let workspace = dir.path().join("cell");
		let stale = workspace.join("dd.line/rddmin-cmp");
		std::fs::create_dir_all(&stale).unwrap();
		std::fs::write(stale.join("dd.line.exclude"), "0x1: f at src.c:99\n").unwrap();

		let config = RunConfig {
			backends: vec![Backend::new("rr", "libinterflop_mca.so -m rr")],
			..RunConfig::default()
		};
		let result = localizer(minimizer, config).localize(cell(&[]), &binary, workspace, &CancellationToken::new()).await;

		let record = &result.dd_results[0];
		assert!(!record.success);
		assert_eq!(record.outcome, LocalizationOutcome::Failed);
		assert!(record.unstable_lines.is_empty());
		assert_eq!(result.threshold, 1e-6);
	}

	#[tokio::test]
	async fn nonzero_exit_with_output_is_a_warning() {
		let dir = tempfile::tempdir().unwrap();
		let minimizer = script(
			dir.path(),
			"vfc_ddebug",
			"mkdir -p dd.line/ddmin0\necho '0x9: f at src.c:21' > dd.line/ddmin0/dd.line.include\nexit 2\n",
		);
		let binary = script(dir.path(), "binary", "echo 1.0\n");
		let config = RunConfig {
			backends: vec![Backend::new("mca", "libinterflop_mca.so -m mca")],
			..RunConfig::default()
		};

		let result = localizer(minimizer, config)
			.localize(cell(&["s"]), &binary, dir.path().join("cell"), &CancellationToken::new())
			.await;

		let record = &result.dd_results[0];
		assert!(record.success);
		assert_eq!(record.outcome, LocalizationOutcome::OkWithWarning);
		assert_eq!(record.returncode, Some(2));
		assert!(record.note.as_deref().unwrap().contains("status 2"));
		assert_eq!(record.ddmin_sets.len(), 1);
		assert!(record.unstable_lines.contains(&21));
	}

	#[tokio::test]
	async fn marked_failure_is_recorded_not_raised() {
		let dir = tempfile::tempdir().unwrap();
		let minimizer = script(dir.path(), "vfc_ddebug", "mkdir -p dd.line\necho 'DD FAILED' >&2\nexit 1\n");
		let binary = script(dir.path(), "binary", "echo 1.0\n");
		let config = RunConfig {
			backends: vec![Backend::new("rr", "x")],
			..RunConfig::default()
		};

		let result = localizer(minimizer, config)
			.localize(cell(&["s"]), &binary, dir.path().join("cell"), &CancellationToken::new())
			.await;

		let record = &result.dd_results[0];
		assert!(!record.success);
		assert_eq!(record.returncode, Some(1));
		assert!(record.error.is_some());
	}

	#[tokio::test]
	async fn slow_minimizer_times_out() {
		let dir = tempfile::tempdir().unwrap();
		let minimizer = script(dir.path(), "vfc_ddebug", "sleep 5\n");
		let binary = script(dir.path(), "binary", "echo 1.0\n");
		let config = RunConfig {
			backends: vec![Backend::new("rr", "x")],
			minimizer_timeout_secs: 1,
			..RunConfig::default()
		};

		let result = localizer(minimizer, config)
			.localize(cell(&[]), &binary, dir.path().join("cell"), &CancellationToken::new())
			.await;

		let record = &result.dd_results[0];
		assert_eq!(record.outcome, LocalizationOutcome::Failed);
		assert!(record.error.as_deref().unwrap().contains("timed out"));
		assert!(record.duration < 5.0);
	}

	#[tokio::test]
	async fn cancelled_cell_still_reports_every_backend() {
		let dir = tempfile::tempdir().unwrap();
		let minimizer = script(dir.path(), "vfc_ddebug", REPORTING_MINIMIZER);
		let binary = script(dir.path(), "binary", "echo 1.0\n");
		let cancel = CancellationToken::new();
		cancel.cancel();

		let result = localizer(minimizer, RunConfig::default()).localize(cell(&[]), &binary, dir.path().join("cell"), &cancel).await;
		assert_eq!(result.dd_results.len(), 3);
		assert!(result.dd_results.iter().all(|r| !r.success));
	}
}
