//! Manifest persistence.
//!
//! Manifests are always replaced atomically (temp file in the target
//! directory, then rename), so readers never observe a partial document.
//! [`ManifestWriter`] serializes concurrent per-cell updates and flushes after
//! each one.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use numstab_primitives::{CellId, SCHEMA_VERSION, StageManifest};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{PipelineError, Result};

/// Reads a manifest, rejecting any other schema version.
pub fn read_manifest<M: DeserializeOwned>(kind: &'static str, path: &Path) -> Result<M> {
	let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	let parse_err = |source| PipelineError::ManifestParse {
		kind,
		path: path.to_path_buf(),
		source,
	};
	let value: serde_json::Value = serde_json::from_str(&text).map_err(parse_err)?;
	let found = value.get("schema_version").and_then(serde_json::Value::as_u64).unwrap_or(0);
	if found != u64::from(SCHEMA_VERSION) {
		return Err(PipelineError::ManifestVersion {
			kind,
			path: path.to_path_buf(),
			found: u32::try_from(found).unwrap_or(u32::MAX),
			expected: SCHEMA_VERSION,
		});
	}
	serde_json::from_value(value).map_err(parse_err)
}

/// Atomically replaces `path` with the pretty-printed manifest.
pub fn write_manifest<M: Serialize>(kind: &'static str, path: &Path, manifest: &M) -> Result<()> {
	let bytes = serde_json::to_vec_pretty(manifest).map_err(|source| PipelineError::ManifestEncode { kind, source })?;
	let write_err = |source| PipelineError::Write {
		path: path.to_path_buf(),
		source,
	};

	let dir = match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() => dir,
		_ => Path::new("."),
	};
	std::fs::create_dir_all(dir).map_err(write_err)?;

	let mut tmp = tempfile::Builder::new().prefix(".manifest").suffix(".tmp").tempfile_in(dir).map_err(write_err)?;
	tmp.write_all(&bytes).map_err(write_err)?;
	tmp.write_all(b"\n").map_err(write_err)?;
	tmp.as_file().sync_all().map_err(write_err)?;
	tmp.persist(path).map_err(|err| write_err(err.error))?;

	debug!(kind, path = %path.display(), bytes = bytes.len(), "Wrote manifest");
	Ok(())
}

/// Single writer for a per-cell stage manifest.
#[derive(Debug)]
pub struct ManifestWriter<M> {
	path: PathBuf,
	inner: Mutex<M>,
}

impl<M: StageManifest> ManifestWriter<M> {
	/// Starts from `fresh`, or from the manifest already at `path` when `resume` is set.
	pub fn open(path: impl Into<PathBuf>, fresh: M, resume: bool) -> Result<Self> {
		let path = path.into();
		let manifest = if resume && path.exists() {
			let existing: M = read_manifest(M::KIND, &path)?;
			info!(kind = M::KIND, path = %path.display(), recorded = existing.entries().len(), "Resuming from existing manifest");
			existing
		} else {
			fresh
		};
		write_manifest(M::KIND, &path, &manifest)?;
		Ok(Self {
			path,
			inner: Mutex::new(manifest),
		})
	}

	/// Keys of every recorded entry.
	pub fn recorded(&self) -> BTreeSet<CellId> {
		self.inner.lock().entries().iter().map(|e| M::entry_key(e).clone()).collect()
	}

	/// Records `entry`, replacing any entry with the same key, and flushes.
	pub fn record(&self, entry: M::Entry) -> Result<()> {
		let mut manifest = self.inner.lock();
		let key = M::entry_key(&entry).clone();
		let entries = manifest.entries_mut();
		match entries.iter().position(|e| M::entry_key(e) == &key) {
			Some(index) => entries[index] = entry,
			None => entries.push(entry),
		}
		manifest.refresh_totals();
		write_manifest(M::KIND, &self.path, &*manifest)
	}

	/// Orders entries by their position in `order` (unknown keys last), writes
	/// the final manifest and returns it.
	pub fn finish(&self, order: &[CellId]) -> Result<M>
	where
		M: Clone,
	{
		let mut manifest = self.inner.lock();
		let rank: HashMap<&CellId, usize> = order.iter().enumerate().map(|(i, id)| (id, i)).collect();
		manifest.entries_mut().sort_by_key(|e| rank.get(M::entry_key(e)).copied().unwrap_or(usize::MAX));
		manifest.refresh_totals();
		write_manifest(M::KIND, &self.path, &*manifest)?;
		Ok(manifest.clone())
	}
}
