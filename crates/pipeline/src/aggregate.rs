//! Merges the compilation, validation and localization manifests into one
//! per-cell accounting.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::Utc;
use numstab_primitives::{
	AggregateManifest, AggregateResult, BackendBreakdown, CellId, CellStatus, CompilationManifest, DdCellResult, DdManifest, RankedCell,
	SCHEMA_VERSION, ValidationEntry, ValidationManifest,
};

/// Builds the aggregate over every compiled cell.
///
/// Cells keep the order of the compilation manifest. `localization_path` is
/// recorded as the provenance of `localization`.
pub fn aggregate(
	compilation: &CompilationManifest,
	validation: &ValidationManifest,
	localization: &DdManifest,
	localization_path: PathBuf,
) -> AggregateManifest {
	let validations: HashMap<&CellId, &ValidationEntry> = validation.validations.iter().map(|v| (&v.cell().config_id, v)).collect();
	let localized: HashMap<&CellId, &DdCellResult> = localization.results.iter().map(|r| (&r.cell.config_id, r)).collect();

	let results: Vec<AggregateResult> = compilation
		.compilations
		.iter()
		.map(|entry| {
			let id = &entry.cell.config_id;
			let validation = validations.get(id).copied();
			let dd = localized.get(id).copied();
			let mut result = AggregateResult {
				cell: entry.cell.clone(),
				status: CellStatus::PendingLocalization,
				validity_reason: validation.and_then(|v| v.validation.validity_reason),
				unstable_lines: BTreeSet::new(),
				backends_succeeded: 0,
				backends_total: 0,
				per_backend: Vec::new(),
			};

			if !entry.record.success {
				result.status = CellStatus::CompilationFailed;
				return result;
			}
			match validation {
				Some(v) if !v.validation.is_eligible() => {
					result.status = CellStatus::SkippedInvalidOutput;
					return result;
				}
				None => return result,
				Some(_) => {}
			}
			let Some(dd) = dd else {
				return result;
			};

			result.backends_total = dd.dd_results.len();
			for record in &dd.dd_results {
				result.per_backend.push(BackendBreakdown {
					backend: record.backend.clone(),
					outcome: record.outcome,
					unstable_lines: record.unstable_lines.clone(),
				});
				if record.success {
					result.backends_succeeded += 1;
					result.unstable_lines.extend(&record.unstable_lines);
				}
			}
			result.status = if result.backends_succeeded == 0 {
				CellStatus::LocalizationFailed
			} else if result.unstable_lines.is_empty() {
				CellStatus::Stable
			} else {
				CellStatus::Unstable
			};
			result
		})
		.collect();

	let mut unstable_ranking: Vec<RankedCell> = results
		.iter()
		.filter(|r| r.status == CellStatus::Unstable)
		.map(|r| RankedCell {
			config_id: r.cell.config_id.clone(),
			unstable_count: r.unstable_lines.len(),
		})
		.collect();
	unstable_ranking.sort_by(|a, b| b.unstable_count.cmp(&a.unstable_count));

	let mut variable_instability: BTreeMap<String, usize> = BTreeMap::new();
	let mut line_instability: BTreeMap<u32, usize> = BTreeMap::new();
	for dd in &localization.results {
		for record in dd.dd_results.iter().filter(|r| r.success) {
			for &line in &record.unstable_lines {
				*line_instability.entry(line).or_default() += 1;
				for var in &dd.cell.modified_vars {
					*variable_instability.entry(var.clone()).or_default() += 1;
				}
			}
		}
	}

	let count = |status: CellStatus| results.iter().filter(|r| r.status == status).count();
	AggregateManifest {
		schema_version: SCHEMA_VERSION,
		generated_at: Utc::now(),
		compilation_manifest: validation.compilation_manifest.clone(),
		validation_manifest: localization.validation_manifest.clone(),
		dd_manifest: localization_path,
		backends: localization.backends.clone(),
		total_cells: results.len(),
		stable: count(CellStatus::Stable),
		unstable: count(CellStatus::Unstable),
		skipped_invalid_output: count(CellStatus::SkippedInvalidOutput),
		compilation_failed: count(CellStatus::CompilationFailed),
		localization_failed: count(CellStatus::LocalizationFailed),
		pending_localization: count(CellStatus::PendingLocalization),
		unstable_ranking,
		variable_instability,
		line_instability,
		results,
	}
}
