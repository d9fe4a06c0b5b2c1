use std::path::Path;
use std::time::Instant;

use numstab_primitives::AggregateManifest;
use tracing::info;

use super::{Layout, MANIFEST_FILE, StageContext};
use crate::Result;
use crate::space::SelectionMode;

/// Chains every stage over `source` into `layout`.
///
/// Each stage reads the manifest its predecessor just wrote, exactly as when
/// the stages are invoked one at a time.
pub async fn run(ctx: &StageContext, source: &Path, function: Option<&str>, mode: &SelectionMode, layout: &Layout) -> Result<AggregateManifest> {
	let start = Instant::now();
	info!(source = %source.display(), mode = %mode, output = %layout.root().display(), "Starting full run");

	super::analyze(source, function, &layout.catalog())?;
	super::configure(&layout.catalog(), mode, &ctx.config, &layout.configurations())?;
	super::variants(&layout.configurations(), &layout.variants_dir()).await?;

	let variant_manifest = layout.variants_dir().join(MANIFEST_FILE);
	let compilation_manifest = layout.binaries_dir().join(MANIFEST_FILE);
	let dd_manifest = layout.ddebug_dir().join(MANIFEST_FILE);

	super::compile(ctx, &variant_manifest, &layout.binaries_dir()).await?;
	super::validate(ctx, &compilation_manifest, &layout.validation()).await?;
	super::localize(ctx, &layout.validation(), &layout.ddebug_dir()).await?;
	let manifest = super::aggregate(&compilation_manifest, &layout.validation(), &dd_manifest, &layout.aggregate())?;

	info!(elapsed_ms = start.elapsed().as_millis() as u64, cells = manifest.total_cells, unstable = manifest.unstable, "Run finished");
	Ok(manifest)
}
