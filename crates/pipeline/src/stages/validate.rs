use std::path::Path;
use std::sync::Arc;

use numstab_primitives::{CellId, CompilationEntry, CompilationManifest, ValidationEntry, ValidationManifest, ValidationRecord};
use numstab_worker::TaskClass;
use tracing::{info, warn};

use super::{StageContext, first_error};
use crate::Result;
use crate::store::{ManifestWriter, read_manifest};
use crate::validator::Validator;

/// Runs every compiled cell once under the exact-arithmetic backend and writes
/// the validation manifest to `output`.
///
/// Cells that failed to compile are recorded without being executed.
pub async fn validate(ctx: &StageContext, compilation_manifest: &Path, output: &Path) -> Result<ValidationManifest> {
	let compilation: CompilationManifest = read_manifest("compilation", compilation_manifest)?;
	let order: Vec<CellId> = compilation.compilations.iter().map(|c| c.cell.config_id.clone()).collect();

	let writer = Arc::new(ManifestWriter::open(output, ValidationManifest::new(compilation_manifest.to_path_buf()), ctx.resume)?);
	let done = writer.recorded();

	let mut pending = Vec::new();
	for entry in compilation.compilations {
		if done.contains(&entry.cell.config_id) {
			continue;
		}
		match entry.record.binary_path.clone() {
			Some(binary) if entry.record.success => pending.push((entry, binary)),
			_ => writer.record(ValidationEntry {
				compilation: entry,
				validation: ValidationRecord::skipped_compilation_failed(),
			})?,
		}
	}
	info!(cells = order.len(), pending = pending.len(), "Validating outputs");

	let validator = Arc::new(Validator::new(&ctx.config));
	let abort = ctx.abort.clone();
	let results = ctx
		.pool(TaskClass::Execute)
		.run(pending, |(entry, binary): (CompilationEntry, std::path::PathBuf), _stop| {
			let validator = Arc::clone(&validator);
			let writer = Arc::clone(&writer);
			let abort = abort.clone();
			async move {
				let binary = std::path::absolute(&binary).unwrap_or(binary);
				let validation = validator.validate(&binary, Some(entry.binary_dir.clone()), &abort).await;
				if validation.valid {
					info!(cell = %entry.cell.config_id, value = validation.output_value.as_deref().unwrap_or_default(), "Valid output");
				} else {
					warn!(cell = %entry.cell.config_id, reason = ?validation.validity_reason, "Excluded from localization");
				}
				writer.record(ValidationEntry {
					compilation: entry,
					validation,
				})
			}
		})
		.await;
	first_error(results)?;

	let manifest = writer.finish(&order)?;
	info!(valid = manifest.valid, invalid = manifest.invalid, skipped = manifest.skipped, "Validation done");
	ctx.ensure_not_stopped("validate")?;
	Ok(manifest)
}
