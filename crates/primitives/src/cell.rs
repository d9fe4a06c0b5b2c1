use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Configuration;

/// Compiler optimization level of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptLevel {
	O0,
	O1,
	O2,
	O3,
}

impl OptLevel {
	pub const ALL: [Self; 4] = [Self::O0, Self::O1, Self::O2, Self::O3];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::O0 => "O0",
			Self::O1 => "O1",
			Self::O2 => "O2",
			Self::O3 => "O3",
		}
	}

	/// Compiler flag requesting this level.
	pub fn flag(self) -> String {
		format!("-{}", self.as_str())
	}
}

impl fmt::Display for OptLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Directory tag for the fast-math toggle.
pub const fn fastmath_tag(fastmath: bool) -> &'static str {
	if fastmath { "fastmath" } else { "nofastmath" }
}

/// Deterministic identity of a cell, used as directory key and manifest join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
	pub fn new(configuration: &str, opt_level: OptLevel, fastmath: bool) -> Self {
		Self(format!("{configuration}_{opt_level}_{}", fastmath_tag(fastmath)))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for CellId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One `(configuration, optimization level, fast-math)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
	pub configuration: Configuration,
	pub opt_level: OptLevel,
	pub fastmath: bool,
}

impl Cell {
	pub fn new(configuration: Configuration, opt_level: OptLevel, fastmath: bool) -> Self {
		Self {
			configuration,
			opt_level,
			fastmath,
		}
	}

	pub fn id(&self) -> CellId {
		CellId::new(&self.configuration.name, self.opt_level, self.fastmath)
	}

	/// Relative directory holding this cell's binary: `<config>/<opt>/<fastmath tag>`.
	pub fn relative_dir(&self) -> PathBuf {
		PathBuf::from(&self.configuration.name).join(self.opt_level.as_str()).join(fastmath_tag(self.fastmath))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FloatType;

	#[test]
	fn cell_id_is_derived_from_components() {
		let cell = Cell::new(Configuration::promoting(["ti"], FloatType::Float), OptLevel::O2, true);
		assert_eq!(cell.id().as_str(), "ti_float_O2_fastmath");
		assert_eq!(cell.relative_dir(), PathBuf::from("ti_float/O2/fastmath"));

		let baseline = Cell::new(Configuration::baseline(), OptLevel::O0, false);
		assert_eq!(baseline.id().as_str(), "baseline_O0_nofastmath");
	}

	#[test]
	fn opt_level_serializes_bare() {
		let json = serde_json::to_string(&OptLevel::O3).unwrap();
		assert_eq!(json, "\"O3\"");
		assert_eq!(OptLevel::O1.flag(), "-O1");
	}
}
