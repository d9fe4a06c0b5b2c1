use std::path::{Path, PathBuf};
use std::sync::Arc;

use numstab_primitives::{
	Cell, CellDescriptor, CellId, CompilationEntry, CompilationManifest, Configuration, VariantEntry, VariantManifest, VariantStatus,
};
use numstab_worker::TaskClass;
use tracing::{info, warn};

use super::{MANIFEST_FILE, StageContext, first_error};
use crate::Result;
use crate::compiler::Compiler;
use crate::space::cells;
use crate::store::{ManifestWriter, read_manifest};
use crate::tools;

const BINARY_NAME: &str = "binary";

/// One verified variant crossed with one build setting.
struct Job {
	variant: VariantEntry,
	cell: Cell,
}

impl Job {
	fn descriptor(&self) -> CellDescriptor {
		CellDescriptor {
			variant_name: self.variant.name.clone(),
			variant_id: self.variant.id.clone(),
			modified_vars: self.variant.modified_vars.clone(),
			opt_level: self.cell.opt_level,
			fastmath: self.cell.fastmath,
			config_id: self.cell.id(),
		}
	}
}

/// Compiles every verified variant at every optimization level and fast-math
/// setting recorded in the variant manifest.
pub async fn compile(ctx: &StageContext, variant_manifest: &Path, output_dir: &Path) -> Result<CompilationManifest> {
	let manifest: VariantManifest = read_manifest("variant", variant_manifest)?;
	let compiler = Arc::new(Compiler::new(tools::resolve(&ctx.config.compiler)?, &ctx.config));

	let mut jobs = Vec::new();
	for variant in manifest.variants.iter().filter(|v| v.status == VariantStatus::Ok) {
		let configuration = Configuration {
			name: variant.name.clone(),
			variables: variant.modified_vars.clone(),
		};
		for cell in cells(&[configuration], &manifest.opt_levels, &manifest.fastmath) {
			jobs.push(Job {
				variant: variant.clone(),
				cell,
			});
		}
	}
	let order: Vec<CellId> = jobs.iter().map(|j| j.cell.id()).collect();

	let writer = Arc::new(ManifestWriter::open(
		output_dir.join(MANIFEST_FILE),
		CompilationManifest::new(variant_manifest.to_path_buf()),
		ctx.resume,
	)?);
	let done = writer.recorded();
	let pending: Vec<Job> = jobs.into_iter().filter(|j| !done.contains(&j.cell.id())).collect();
	info!(cells = order.len(), pending = pending.len(), jobs = ctx.config.jobs, "Compiling cells");

	let output_dir: PathBuf = output_dir.to_path_buf();
	let abort = ctx.abort.clone();
	let results = ctx
		.pool(TaskClass::Compile)
		.run(pending, |job, _stop| {
			let compiler = Arc::clone(&compiler);
			let writer = Arc::clone(&writer);
			let abort = abort.clone();
			let binary_dir = output_dir.join(job.cell.relative_dir());
			async move {
				let binary = binary_dir.join(BINARY_NAME);
				let record = compiler.compile(&job.variant.source_path, &binary, job.cell.opt_level, job.cell.fastmath, &abort).await;
				let cell = job.descriptor();
				if record.success {
					info!(cell = %cell.config_id, elapsed_ms = (record.compile_time * 1e3) as u64, "Compiled");
				} else {
					warn!(cell = %cell.config_id, returncode = record.returncode, timed_out = record.timed_out, "Compilation failed");
				}
				writer.record(CompilationEntry { cell, binary_dir, record })
			}
		})
		.await;
	first_error(results)?;

	let manifest = writer.finish(&order)?;
	info!(successful = manifest.successful, failed = manifest.failed, "Compilation matrix done");
	ctx.ensure_not_stopped("compile")?;
	Ok(manifest)
}
