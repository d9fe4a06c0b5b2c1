//! Resolution of external tools before a stage starts.

use std::path::PathBuf;

use tracing::debug;

use crate::{PipelineError, Result};

/// Resolves `tool` (a bare name looked up on `PATH`, or a path) to an executable.
pub fn resolve(tool: &str) -> Result<PathBuf> {
	match which::which(tool) {
		Ok(path) => {
			debug!(tool, path = %path.display(), "Resolved external tool");
			Ok(path)
		}
		Err(source) => Err(PipelineError::ToolMissing { tool: tool.to_owned(), source }),
	}
}
