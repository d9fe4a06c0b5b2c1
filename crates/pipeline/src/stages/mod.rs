//! Stage drivers.
//!
//! Every stage reads its predecessor's manifest from disk and writes exactly
//! one manifest of its own, so stages can be run one by one or chained by
//! [`run`]. Per-cell stages fan out over a [`CellPool`] and flush their
//! manifest after every cell.

mod aggregate;
mod analyze;
mod compile;
mod configure;
mod localize;
mod run;
mod validate;
mod variants;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use numstab_worker::{CancellationToken, CellPool, TaskClass};
use tracing::warn;

pub use self::aggregate::aggregate;
pub use self::analyze::analyze;
pub use self::compile::compile;
pub use self::configure::configure;
pub use self::localize::localize;
pub use self::run::run;
pub use self::validate::validate;
pub use self::variants::variants;
use crate::config::RunConfig;
use crate::{PipelineError, Result};

/// Name of the manifest inside a stage output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Output layout of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
	root: PathBuf,
}

impl Layout {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn catalog(&self) -> PathBuf {
		self.root.join("catalog.json")
	}

	pub fn configurations(&self) -> PathBuf {
		self.root.join("configurations.json")
	}

	pub fn variants_dir(&self) -> PathBuf {
		self.root.join("variants")
	}

	pub fn binaries_dir(&self) -> PathBuf {
		self.root.join("binaries")
	}

	pub fn validation(&self) -> PathBuf {
		self.root.join("validation.json")
	}

	pub fn ddebug_dir(&self) -> PathBuf {
		self.root.join("ddebug")
	}

	pub fn aggregate(&self) -> PathBuf {
		self.root.join("aggregate.json")
	}
}

/// Shared state of one stage invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
	pub config: Arc<RunConfig>,
	/// Stops dispatching new cells; in-flight cells run to completion or timeout.
	pub stop: CancellationToken,
	/// Kills in-flight external processes.
	pub abort: CancellationToken,
	/// Keep cells already recorded in an existing output manifest.
	pub resume: bool,
}

impl StageContext {
	pub fn new(config: Arc<RunConfig>) -> Self {
		Self {
			config,
			stop: CancellationToken::new(),
			abort: CancellationToken::new(),
			resume: false,
		}
	}

	pub fn with_resume(mut self, resume: bool) -> Self {
		self.resume = resume;
		self
	}

	pub(crate) fn pool(&self, class: TaskClass) -> CellPool {
		CellPool::new(class, self.config.jobs, self.stop.clone())
	}

	/// `Err(Interrupted)` once a stop was requested; called after a stage has
	/// flushed its manifest.
	pub(crate) fn ensure_not_stopped(&self, stage: &'static str) -> Result<()> {
		if self.stop.is_cancelled() {
			warn!(stage, "Stage interrupted; manifest holds the cells finished so far");
			return Err(PipelineError::Interrupted);
		}
		Ok(())
	}
}

/// Collapses per-cell job results, surfacing the first manifest error.
pub(crate) fn first_error(results: Vec<Result<()>>) -> Result<()> {
	results.into_iter().collect()
}
