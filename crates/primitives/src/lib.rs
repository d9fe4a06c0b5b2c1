//! Core types for the numstab pipeline: variables, configurations, cells,
//! per-stage records, and the versioned manifests that connect the stages.

/// Compilation cells and optimization levels.
pub mod cell;
/// Named variable subsets promoted to reduced precision.
pub mod configuration;
/// Versioned JSON manifests exchanged between stages.
pub mod manifest;
/// Per-cell records produced by the compile, validate, localize and aggregate stages.
pub mod record;
/// Floating-point variable declarations and their scopes.
pub mod variable;

pub use cell::{Cell, CellId, OptLevel};
pub use configuration::{BASELINE_NAME, Configuration};
pub use manifest::{
	AggregateManifest, CatalogManifest, CellDescriptor, ConfigManifest, CompilationEntry, CompilationManifest, DdCellResult, DdManifest, RankedCell,
	SCHEMA_VERSION, StageManifest, ValidationEntry, ValidationManifest, VariantEntry, VariantManifest, VariantStatus,
};
pub use record::{
	AggregateResult, BackendBreakdown, CellStatus, CompilationRecord, DdminSet, LocalizationOutcome, LocalizationRecord, ValidationRecord,
	ValidationStatus, ValidityReason,
};
pub use variable::{FloatType, ParseFloatTypeError, Scope, Variable};
