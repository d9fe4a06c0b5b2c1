use std::path::Path;

use numstab_primitives::{AggregateManifest, CompilationManifest, DdManifest, ValidationManifest};
use tracing::info;

use crate::Result;
use crate::store::{read_manifest, write_manifest};

/// Merges the three per-cell manifests into the aggregate written to `output`.
pub fn aggregate(compilation_manifest: &Path, validation_manifest: &Path, dd_manifest: &Path, output: &Path) -> Result<AggregateManifest> {
	let compilation: CompilationManifest = read_manifest("compilation", compilation_manifest)?;
	let validation: ValidationManifest = read_manifest("validation", validation_manifest)?;
	let localization: DdManifest = read_manifest("ddebug", dd_manifest)?;

	let mut manifest = crate::aggregate::aggregate(&compilation, &validation, &localization, dd_manifest.to_path_buf());
	manifest.compilation_manifest = compilation_manifest.to_path_buf();
	manifest.validation_manifest = validation_manifest.to_path_buf();
	write_manifest("aggregate", output, &manifest)?;

	info!(
		cells = manifest.total_cells,
		stable = manifest.stable,
		unstable = manifest.unstable,
		skipped = manifest.skipped_invalid_output,
		compilation_failed = manifest.compilation_failed,
		localization_failed = manifest.localization_failed,
		output = %output.display(),
		"Aggregate written"
	);
	Ok(manifest)
}
