//! Immutable run configuration.
//!
//! Built once at startup from defaults, optionally overlaid by a TOML file,
//! validated, and then shared by `Arc` with every stage.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use numstab_primitives::{FloatType, OptLevel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{PipelineError, Result};

/// A stochastic-arithmetic backend selectable through the backend variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
	pub name: String,
	/// Value passed verbatim in the backend environment variable.
	pub env: String,
}

impl Backend {
	pub fn new(name: impl Into<String>, env: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			env: env.into(),
		}
	}
}

/// Deviation thresholds of the compare oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
	/// Applied to cells that promote no variable.
	pub baseline: f64,
	/// Applied to cells running with reduced-precision variables.
	pub reduced: f64,
}

impl Default for Thresholds {
	fn default() -> Self {
		Self {
			baseline: 1e-6,
			reduced: 1e-2,
		}
	}
}

impl Thresholds {
	pub fn for_configuration(&self, modified_vars: &BTreeSet<String>) -> f64 {
		if modified_vars.is_empty() { self.baseline } else { self.reduced }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
	pub compiler: String,
	pub compile_timeout_secs: u64,
	/// Appended after the cell flags, typically libraries.
	pub extra_flags: Vec<String>,
	/// Debug and fault-localization flags requested for every cell.
	pub debug_flags: Vec<String>,
	pub opt_levels: Vec<OptLevel>,
	pub fastmath: Vec<bool>,
	pub target_type: FloatType,

	pub backend_env_var: String,
	pub exact_backend: String,
	pub validation_timeout_secs: u64,
	/// Arguments passed to cell binaries, both in validation and in the run script.
	pub program_args: Vec<String>,

	pub minimizer: String,
	pub minimizer_timeout_secs: u64,
	/// Name of the minimizer output tree inside a cell workspace.
	pub minimizer_output: String,
	/// Case-insensitive marker identifying a failed minimizer session.
	pub failure_marker: String,
	pub backends: Vec<Backend>,
	pub thresholds: Thresholds,
	/// Program invoked by generated compare scripts as `<comparator> compare ...`.
	/// Filled with the running executable when unset.
	pub comparator: Option<PathBuf>,

	pub jobs: usize,
	/// Variable combinations for the `custom` selection mode.
	pub custom: Vec<Vec<String>>,
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			compiler: "verificarlo".into(),
			compile_timeout_secs: 60,
			extra_flags: vec!["-lm".into()],
			debug_flags: vec!["-g".into(), "--ddebug".into()],
			opt_levels: OptLevel::ALL.to_vec(),
			fastmath: vec![false, true],
			target_type: FloatType::Float,
			backend_env_var: "VFC_BACKENDS".into(),
			exact_backend: "libinterflop_ieee.so".into(),
			validation_timeout_secs: 10,
			program_args: Vec::new(),
			minimizer: "vfc_ddebug".into(),
			minimizer_timeout_secs: 600,
			minimizer_output: "dd.line".into(),
			failure_marker: "failed".into(),
			backends: vec![
				Backend::new("rr", "libinterflop_mca.so -m rr --precision-binary64=53"),
				Backend::new("mca", "libinterflop_mca.so -m mca --precision-binary64=53"),
				Backend::new("cancellation", "libinterflop_cancellation.so"),
			],
			thresholds: Thresholds::default(),
			comparator: None,
			jobs: default_jobs(),
			custom: Vec::new(),
		}
	}
}

fn default_jobs() -> usize {
	std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8)
}

impl RunConfig {
	/// Defaults overlaid by the TOML file at `path`, if any, then validated.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let config = match path {
			Some(path) => {
				let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
					path: path.to_path_buf(),
					source,
				})?;
				let config: Self = toml::from_str(&text).map_err(|source| PipelineError::ConfigParse {
					path: path.to_path_buf(),
					source,
				})?;
				debug!(path = %path.display(), "Loaded run configuration");
				config
			}
			None => Self::default(),
		};
		config.validate()?;
		Ok(config)
	}

	/// Rejects configurations no stage could run with.
	pub fn validate(&self) -> Result<()> {
		let fail = |msg: String| -> Result<()> { Err(PipelineError::Config(msg)) };

		if self.compiler.trim().is_empty() {
			return fail("`compiler` is empty".into());
		}
		if self.minimizer.trim().is_empty() {
			return fail("`minimizer` is empty".into());
		}
		if self.opt_levels.is_empty() {
			return fail("`opt_levels` is empty".into());
		}
		if self.fastmath.is_empty() {
			return fail("`fastmath` is empty".into());
		}
		if self.backends.is_empty() {
			return fail("`backends` is empty".into());
		}
		let mut seen = BTreeSet::new();
		for backend in &self.backends {
			if backend.name.trim().is_empty() {
				return fail("backend with empty name".into());
			}
			if !seen.insert(backend.name.as_str()) {
				return fail(format!("duplicate backend `{}`", backend.name));
			}
		}
		for (name, value) in [("thresholds.baseline", self.thresholds.baseline), ("thresholds.reduced", self.thresholds.reduced)] {
			if !value.is_finite() || value <= 0.0 {
				return fail(format!("`{name}` must be a positive finite number, got {value}"));
			}
		}
		for (name, value) in [
			("compile_timeout_secs", self.compile_timeout_secs),
			("validation_timeout_secs", self.validation_timeout_secs),
			("minimizer_timeout_secs", self.minimizer_timeout_secs),
		] {
			if value == 0 {
				return fail(format!("`{name}` must be positive"));
			}
		}
		if self.jobs == 0 {
			return fail("`jobs` must be positive".into());
		}
		if self.minimizer_output.is_empty() || self.minimizer_output.contains('/') {
			return fail("`minimizer_output` must be a plain directory name".into());
		}
		if self.custom.iter().any(Vec::is_empty) {
			return fail("`custom` contains an empty combination".into());
		}
		Ok(())
	}

	pub fn compile_timeout(&self) -> Duration {
		Duration::from_secs(self.compile_timeout_secs)
	}

	pub fn validation_timeout(&self) -> Duration {
		Duration::from_secs(self.validation_timeout_secs)
	}

	pub fn minimizer_timeout(&self) -> Duration {
		Duration::from_secs(self.minimizer_timeout_secs)
	}

	pub fn backend_names(&self) -> Vec<String> {
		self.backends.iter().map(|b| b.name.clone()).collect()
	}
}
