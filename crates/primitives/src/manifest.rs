//! Stage manifests.
//!
//! Each stage reads the manifest(s) of its predecessor and writes exactly one
//! manifest of its own. Every manifest carries [`SCHEMA_VERSION`], a creation
//! timestamp, and the path of the manifest it was derived from.
//!
//! ```text
//! catalog -> configurations -> variants -> compilations -> validation -> ddebug -> aggregate
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::record::{AggregateResult, CompilationRecord, LocalizationRecord, ValidationRecord};
use crate::{CellId, Configuration, FloatType, OptLevel, Scope, Variable};

/// Version written into, and required from, every manifest.
pub const SCHEMA_VERSION: u32 = 1;

/// Common shape of manifests that accumulate one entry per cell.
pub trait StageManifest: Serialize + DeserializeOwned + Send + 'static {
	type Entry: Serialize + Clone + Send + 'static;

	/// Human-readable manifest kind, used in logs and errors.
	const KIND: &'static str;

	fn schema_version(&self) -> u32;
	fn entries(&self) -> &[Self::Entry];
	fn entries_mut(&mut self) -> &mut Vec<Self::Entry>;
	/// Join key of an entry.
	fn entry_key(entry: &Self::Entry) -> &CellId;
	/// Recomputes summary counters from the entries.
	fn refresh_totals(&mut self);
}

/// Identity and provenance columns shared by per-cell manifest entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDescriptor {
	pub variant_name: String,
	pub variant_id: String,
	pub modified_vars: BTreeSet<String>,
	pub opt_level: OptLevel,
	pub fastmath: bool,
	pub config_id: CellId,
}

impl CellDescriptor {
	pub fn is_baseline(&self) -> bool {
		self.modified_vars.is_empty()
	}
}

/// Output of the catalog stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub source_file: PathBuf,
	/// Requested scope, `"global"` when the whole file was scanned.
	pub function: Scope,
	pub variables: Vec<Variable>,
}

impl CatalogManifest {
	pub fn new(source_file: PathBuf, function: Scope, variables: Vec<Variable>) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			generated_at: Utc::now(),
			source_file,
			function,
			variables,
		}
	}

	/// Variable names in declaration order, without repeats.
	pub fn variable_names(&self) -> Vec<String> {
		let mut seen = BTreeSet::new();
		self.variables.iter().filter(|v| seen.insert(v.name.as_str())).map(|v| v.name.clone()).collect()
	}
}

/// Output of configuration-space generation: the configurations and the
/// build axes they are crossed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub catalog_manifest: PathBuf,
	pub source_file: PathBuf,
	/// Catalog scope; mutation is confined to this function's body.
	pub function: Scope,
	pub mode: String,
	pub target_type: FloatType,
	pub opt_levels: Vec<OptLevel>,
	pub fastmath: Vec<bool>,
	pub total_configurations: usize,
	pub total_cells: usize,
	/// Baseline first.
	pub configurations: Vec<Configuration>,
}

impl ConfigManifest {
	pub fn new(
		catalog_manifest: PathBuf,
		catalog: &CatalogManifest,
		mode: String,
		target_type: FloatType,
		opt_levels: Vec<OptLevel>,
		fastmath: Vec<bool>,
		configurations: Vec<Configuration>,
	) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			generated_at: Utc::now(),
			catalog_manifest,
			source_file: catalog.source_file.clone(),
			function: catalog.function.clone(),
			mode,
			target_type,
			total_configurations: configurations.len(),
			total_cells: configurations.len() * opt_levels.len() * fastmath.len(),
			opt_levels,
			fastmath,
			configurations,
		}
	}
}

/// Whether a variant's source was rewritten as requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
	Ok,
	/// Verification found a requested variable whose type did not change; never compiled.
	ModificationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantEntry {
	pub id: String,
	pub name: String,
	pub modified_vars: BTreeSet<String>,
	pub source_path: PathBuf,
	pub variant_dir: PathBuf,
	pub status: VariantStatus,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub failed_vars: Vec<String>,
}

/// Output of the variant generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub config_manifest: PathBuf,
	pub original_source: PathBuf,
	pub mode: String,
	pub target_type: FloatType,
	/// Build axes carried over from the configuration manifest.
	pub opt_levels: Vec<OptLevel>,
	pub fastmath: Vec<bool>,
	pub total_variants: usize,
	pub variants: Vec<VariantEntry>,
}

impl VariantManifest {
	pub fn new(config_manifest: PathBuf, config: &ConfigManifest, variants: Vec<VariantEntry>) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			generated_at: Utc::now(),
			config_manifest,
			original_source: config.source_file.clone(),
			mode: config.mode.clone(),
			target_type: config.target_type,
			opt_levels: config.opt_levels.clone(),
			fastmath: config.fastmath.clone(),
			total_variants: variants.len(),
			variants,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationEntry {
	#[serde(flatten)]
	pub cell: CellDescriptor,
	pub binary_dir: PathBuf,
	#[serde(flatten)]
	pub record: CompilationRecord,
}

/// Output of the compilation matrix stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub variant_manifest: PathBuf,
	pub total_compilations: usize,
	pub successful: usize,
	pub failed: usize,
	pub compilations: Vec<CompilationEntry>,
}

impl CompilationManifest {
	pub fn new(variant_manifest: PathBuf) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			generated_at: Utc::now(),
			variant_manifest,
			total_compilations: 0,
			successful: 0,
			failed: 0,
			compilations: Vec::new(),
		}
	}
}

impl StageManifest for CompilationManifest {
	type Entry = CompilationEntry;

	const KIND: &'static str = "compilation";

	fn schema_version(&self) -> u32 {
		self.schema_version
	}

	fn entries(&self) -> &[CompilationEntry] {
		&self.compilations
	}

	fn entries_mut(&mut self) -> &mut Vec<CompilationEntry> {
		&mut self.compilations
	}

	fn entry_key(entry: &CompilationEntry) -> &CellId {
		&entry.cell.config_id
	}

	fn refresh_totals(&mut self) {
		self.total_compilations = self.compilations.len();
		self.successful = self.compilations.iter().filter(|c| c.record.success).count();
		self.failed = self.total_compilations - self.successful;
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEntry {
	#[serde(flatten)]
	pub compilation: CompilationEntry,
	#[serde(flatten)]
	pub validation: ValidationRecord,
}

impl ValidationEntry {
	pub fn cell(&self) -> &CellDescriptor {
		&self.compilation.cell
	}
}

/// Output of the output validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub compilation_manifest: PathBuf,
	pub total_tested: usize,
	pub valid: usize,
	/// Executed cells whose output was non-finite or unparseable.
	pub invalid: usize,
	/// Cells never executed because compilation failed.
	#[serde(default)]
	pub skipped: usize,
	pub validations: Vec<ValidationEntry>,
}

impl ValidationManifest {
	pub fn new(compilation_manifest: PathBuf) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			generated_at: Utc::now(),
			compilation_manifest,
			total_tested: 0,
			valid: 0,
			invalid: 0,
			skipped: 0,
			validations: Vec::new(),
		}
	}
}

impl StageManifest for ValidationManifest {
	type Entry = ValidationEntry;

	const KIND: &'static str = "validation";

	fn schema_version(&self) -> u32 {
		self.schema_version
	}

	fn entries(&self) -> &[ValidationEntry] {
		&self.validations
	}

	fn entries_mut(&mut self) -> &mut Vec<ValidationEntry> {
		&mut self.validations
	}

	fn entry_key(entry: &ValidationEntry) -> &CellId {
		&entry.cell().config_id
	}

	fn refresh_totals(&mut self) {
		self.total_tested = self.validations.len();
		self.valid = self.validations.iter().filter(|v| v.validation.valid).count();
		self.skipped = self.validations.iter().filter(|v| !v.compilation.record.success).count();
		self.invalid = self.total_tested - self.valid - self.skipped;
	}
}

/// Localization results of one cell, one record per backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdCellResult {
	#[serde(flatten)]
	pub cell: CellDescriptor,
	/// Deviation threshold written into this cell's compare script.
	pub threshold: f64,
	pub dd_workspace: PathBuf,
	pub dd_results: Vec<LocalizationRecord>,
}

/// Output of the fault localization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub validation_manifest: PathBuf,
	pub backends: Vec<String>,
	pub total_configs: usize,
	pub results: Vec<DdCellResult>,
}

impl DdManifest {
	pub fn new(validation_manifest: PathBuf, backends: Vec<String>) -> Self {
		Self {
			schema_version: SCHEMA_VERSION,
			generated_at: Utc::now(),
			validation_manifest,
			backends,
			total_configs: 0,
			results: Vec::new(),
		}
	}
}

impl StageManifest for DdManifest {
	type Entry = DdCellResult;

	const KIND: &'static str = "ddebug";

	fn schema_version(&self) -> u32 {
		self.schema_version
	}

	fn entries(&self) -> &[DdCellResult] {
		&self.results
	}

	fn entries_mut(&mut self) -> &mut Vec<DdCellResult> {
		&mut self.results
	}

	fn entry_key(entry: &DdCellResult) -> &CellId {
		&entry.cell.config_id
	}

	fn refresh_totals(&mut self) {
		self.total_configs = self.results.len();
	}
}

/// Unstable cell with the size of its unstable line union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCell {
	pub config_id: CellId,
	pub unstable_count: usize,
}

/// Terminal artifact handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateManifest {
	pub schema_version: u32,
	pub generated_at: DateTime<Utc>,
	pub compilation_manifest: PathBuf,
	pub validation_manifest: PathBuf,
	pub dd_manifest: PathBuf,
	pub backends: Vec<String>,
	pub total_cells: usize,
	pub stable: usize,
	pub unstable: usize,
	pub skipped_invalid_output: usize,
	pub compilation_failed: usize,
	pub localization_failed: usize,
	pub pending_localization: usize,
	pub results: Vec<AggregateResult>,
	/// Unstable cells, largest unstable line set first.
	pub unstable_ranking: Vec<RankedCell>,
	/// Unstable line detections attributed to each promoted variable.
	pub variable_instability: BTreeMap<String, usize>,
	/// Number of successful backend runs reporting each line.
	pub line_instability: BTreeMap<u32, usize>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Configuration, ValidationRecord};

	fn descriptor() -> CellDescriptor {
		CellDescriptor {
			variant_name: "ti_float".into(),
			variant_id: "variant_001".into(),
			modified_vars: ["ti".to_owned()].into(),
			opt_level: OptLevel::O2,
			fastmath: false,
			config_id: CellId::new("ti_float", OptLevel::O2, false),
		}
	}

	fn compilation() -> CompilationEntry {
		CompilationEntry {
			cell: descriptor(),
			binary_dir: "binaries/ti_float/O2/nofastmath".into(),
			record: CompilationRecord {
				success: true,
				binary_path: Some("binaries/ti_float/O2/nofastmath/binary".into()),
				returncode: 0,
				stdout: String::new(),
				stderr: String::new(),
				compile_time: 0.4,
				error_message: None,
				timed_out: false,
			},
		}
	}

	#[test]
	fn compilation_entries_are_flat() {
		let value = serde_json::to_value(compilation()).unwrap();
		assert_eq!(value["config_id"], "ti_float_O2_nofastmath");
		assert_eq!(value["variant_id"], "variant_001");
		assert_eq!(value["success"], true);
		assert_eq!(value["opt_level"], "O2");
		assert!(value.get("error_message").is_none());
	}

	#[test]
	fn validation_entries_extend_compilation_fields() {
		let entry = ValidationEntry {
			compilation: compilation(),
			validation: ValidationRecord::observed(f64::NAN, Some(0), "nan\n".into(), String::new()),
		};
		let value = serde_json::to_value(&entry).unwrap();
		assert_eq!(value["compile_time"], 0.4);
		assert_eq!(value["validity_reason"], "NaN");
		assert_eq!(value["skip_ddebug"], true);
		assert_eq!(value["output_value"], "NaN");

		let back: ValidationEntry = serde_json::from_value(value).unwrap();
		assert_eq!(back.cell().config_id, entry.cell().config_id);
		assert!(!back.validation.valid);
	}

	#[test]
	fn totals_follow_entries() {
		let mut manifest = CompilationManifest::new("variants/manifest.json".into());
		let mut failed = compilation();
		failed.record.success = false;
		failed.cell.config_id = CellId::new("ti_float", OptLevel::O3, false);
		manifest.compilations = vec![compilation(), failed];
		manifest.refresh_totals();
		assert_eq!((manifest.total_compilations, manifest.successful, manifest.failed), (2, 1, 1));
	}

	#[test]
	fn config_manifest_counts_cells() {
		let configs = vec![Configuration::baseline(), Configuration::promoting(["ti"], FloatType::Float)];
		let manifest = ConfigManifest::new(
			"catalog.json".into(),
			&CatalogManifest::new("archimedes.c".into(), Scope::Function("archimedes".into()), Vec::new()),
			"all".into(),
			FloatType::Float,
			OptLevel::ALL.to_vec(),
			vec![false, true],
			configs,
		);
		assert_eq!(manifest.total_configurations, 2);
		assert_eq!(manifest.total_cells, 16);
	}

	#[test]
	fn catalog_names_are_deduplicated_in_order() {
		let var = |name: &str, scope: &str| Variable {
			name: name.into(),
			ty: FloatType::Double,
			line: 1,
			scope: Scope::Function(scope.into()),
			declaration: String::new(),
		};
		let catalog = CatalogManifest::new("a.c".into(), Scope::Global, vec![var("ti", "f"), var("s", "f"), var("ti", "g")]);
		assert_eq!(catalog.variable_names(), ["ti", "s"]);
	}
}
