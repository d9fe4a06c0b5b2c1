use std::path::{Path, PathBuf};

use numstab_primitives::{ConfigManifest, VariantEntry, VariantManifest, VariantStatus};
use numstab_worker::TaskClass;
use tracing::{info, warn};

use super::MANIFEST_FILE;
use crate::store::{read_manifest, write_manifest};
use crate::{PipelineError, Result};

/// Writes one mutated source per configuration under `output_dir` and the
/// variant manifest next to them.
///
/// Variants whose mutation cannot be verified are recorded as
/// `modification_failed` and are never compiled.
pub async fn variants(config_manifest: &Path, output_dir: &Path) -> Result<VariantManifest> {
	let config_manifest = config_manifest.to_path_buf();
	let output_dir = output_dir.to_path_buf();
	numstab_worker::spawn_blocking(TaskClass::Io, move || write_variants(&config_manifest, &output_dir)).await?
}

fn write_variants(config_path: &Path, output_dir: &Path) -> Result<VariantManifest> {
	let config: ConfigManifest = read_manifest("configuration", config_path)?;
	let source = &config.source_file;
	if !source.is_file() {
		return Err(PipelineError::SourceNotFound(source.clone()));
	}
	let text = std::fs::read_to_string(source).map_err(|err| PipelineError::Read {
		path: source.clone(),
		source: err,
	})?;
	let function = config.function.function();
	let file_name = source.file_name().map_or_else(|| PathBuf::from("source.c"), PathBuf::from);

	let mut entries = Vec::with_capacity(config.configurations.len());
	for (index, configuration) in config.configurations.iter().enumerate() {
		let id = format!("variant_{index:03}");
		let variant_dir = output_dir.join(&id);
		let source_path = variant_dir.join(&file_name);

		let mutated = numstab_source::mutate(&text, function, &configuration.variables, config.target_type);
		let check = numstab_source::verify(&mutated, function, &configuration.variables, config.target_type);
		let status = if check.all_ok() {
			VariantStatus::Ok
		} else {
			warn!(variant = %configuration.name, failed = ?check.failed, "Mutation not verified; variant will not be compiled");
			VariantStatus::ModificationFailed
		};

		std::fs::create_dir_all(&variant_dir).map_err(|err| PipelineError::Write {
			path: variant_dir.clone(),
			source: err,
		})?;
		std::fs::write(&source_path, &mutated).map_err(|err| PipelineError::Write {
			path: source_path.clone(),
			source: err,
		})?;

		entries.push(VariantEntry {
			id,
			name: configuration.name.clone(),
			modified_vars: configuration.variables.clone(),
			source_path,
			variant_dir,
			status,
			failed_vars: check.failed,
		});
	}

	let manifest = VariantManifest::new(config_path.to_path_buf(), &config, entries);
	let path = output_dir.join(MANIFEST_FILE);
	write_manifest("variant", &path, &manifest)?;

	let failed = manifest.variants.iter().filter(|v| v.status == VariantStatus::ModificationFailed).count();
	info!(variants = manifest.total_variants, modification_failed = failed, output = %path.display(), "Variants written");
	Ok(manifest)
}
