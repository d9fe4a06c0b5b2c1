use std::path::{Path, PathBuf};
use std::sync::Arc;

use numstab_primitives::{CellDescriptor, CellId, DdManifest, ValidationManifest};
use numstab_worker::TaskClass;
use tracing::info;

use super::{MANIFEST_FILE, StageContext, first_error};
use crate::ddebug::Localizer;
use crate::store::{ManifestWriter, read_manifest};
use crate::{PipelineError, Result, tools};

/// Runs fault localization for every cell the validation manifest marks as
/// eligible, one workspace per cell under `output_dir`.
pub async fn localize(ctx: &StageContext, validation_manifest: &Path, output_dir: &Path) -> Result<DdManifest> {
	let validation: ValidationManifest = read_manifest("validation", validation_manifest)?;
	let comparator = ctx
		.config
		.comparator
		.clone()
		.ok_or_else(|| PipelineError::Config("no comparator program configured for compare scripts".into()))?;
	let minimizer = tools::resolve(&ctx.config.minimizer)?;
	let localizer = Arc::new(Localizer::new(minimizer, comparator, &ctx.config));

	let eligible: Vec<(CellDescriptor, PathBuf)> = validation
		.validations
		.into_iter()
		.filter(|v| v.validation.is_eligible())
		.filter_map(|v| {
			let binary = v.compilation.record.binary_path?;
			Some((v.compilation.cell, binary))
		})
		.collect();
	let order: Vec<CellId> = eligible.iter().map(|(cell, _)| cell.config_id.clone()).collect();

	let writer = Arc::new(ManifestWriter::open(
		output_dir.join(MANIFEST_FILE),
		DdManifest::new(validation_manifest.to_path_buf(), ctx.config.backend_names()),
		ctx.resume,
	)?);
	let done = writer.recorded();
	let pending: Vec<_> = eligible.into_iter().filter(|(cell, _)| !done.contains(&cell.config_id)).collect();
	info!(cells = order.len(), pending = pending.len(), backends = ?ctx.config.backend_names(), "Localizing unstable lines");

	let abort = ctx.abort.clone();
	let results = ctx
		.pool(TaskClass::Localize)
		.run(pending, |(cell, binary): (CellDescriptor, PathBuf), _stop| {
			let localizer = Arc::clone(&localizer);
			let writer = Arc::clone(&writer);
			let abort = abort.clone();
			let workspace = output_dir.join(cell.config_id.as_str());
			async move {
				let result = localizer.localize(cell, &binary, workspace, &abort).await;
				writer.record(result)
			}
		})
		.await;
	first_error(results)?;

	let manifest = writer.finish(&order)?;
	let succeeded = manifest.results.iter().flat_map(|r| &r.dd_results).filter(|r| r.success).count();
	let runs = manifest.results.iter().map(|r| r.dd_results.len()).sum::<usize>();
	info!(cells = manifest.total_configs, succeeded, runs, "Localization done");
	ctx.ensure_not_stopped("localize")?;
	Ok(manifest)
}
