use std::path::Path;

use numstab_primitives::{CatalogManifest, ConfigManifest};
use tracing::info;

use crate::Result;
use crate::config::RunConfig;
use crate::space::{SelectionMode, generate};
use crate::store::{read_manifest, write_manifest};

/// Generates the configuration space over the catalog at `catalog_path`.
pub fn configure(catalog_path: &Path, mode: &SelectionMode, config: &RunConfig, output: &Path) -> Result<ConfigManifest> {
	let catalog: CatalogManifest = read_manifest("catalog", catalog_path)?;
	let configurations = generate(&catalog.variable_names(), mode, config.target_type)?;

	let manifest = ConfigManifest::new(
		catalog_path.to_path_buf(),
		&catalog,
		mode.name().to_owned(),
		config.target_type,
		config.opt_levels.clone(),
		config.fastmath.clone(),
		configurations,
	);
	write_manifest("configuration", output, &manifest)?;
	info!(
		mode = %mode,
		configurations = manifest.total_configurations,
		cells = manifest.total_cells,
		output = %output.display(),
		"Configuration space written"
	);
	Ok(manifest)
}
