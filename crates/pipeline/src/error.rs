use std::path::PathBuf;

use thiserror::Error;

use crate::space::SpaceError;

/// Setup-level failures that abort a stage.
///
/// Per-cell failures never surface here; they are recorded in the stage
/// manifests instead.
#[derive(Debug, Error)]
pub enum PipelineError {
	#[error("source file not found: {0}")]
	SourceNotFound(PathBuf),
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("malformed {kind} manifest {path}: {source}")]
	ManifestParse {
		kind: &'static str,
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("{kind} manifest {path} has schema version {found}, expected {expected}")]
	ManifestVersion {
		kind: &'static str,
		path: PathBuf,
		found: u32,
		expected: u32,
	},
	#[error("failed to encode {kind} manifest: {source}")]
	ManifestEncode {
		kind: &'static str,
		#[source]
		source: serde_json::Error,
	},
	#[error("no floating-point variables found in {scope}")]
	NoVariables { scope: String },
	#[error(transparent)]
	Space(#[from] SpaceError),
	#[error("invalid run configuration: {0}")]
	Config(String),
	#[error("failed to parse run configuration {path}: {source}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("required tool `{tool}` not found on PATH: {source}")]
	ToolMissing {
		tool: String,
		#[source]
		source: which::Error,
	},
	#[error("worker task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
	#[error("interrupted")]
	Interrupted,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
