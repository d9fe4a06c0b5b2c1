//! Configuration-space generation.
//!
//! A pure function of the catalog's variable names and a selection mode. The
//! baseline is always present exactly once and always first.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use numstab_primitives::{Cell, Configuration, FloatType, OptLevel};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
	#[error("selection mode `single` requires a variable")]
	MissingVariable,
	#[error("variable `{0}` is not in the catalog")]
	UnknownVariable(String),
	#[error("configuration `{0}` is generated more than once")]
	DuplicateName(String),
	#[error("generated {actual} pairs, expected {expected}")]
	PairCountMismatch { expected: usize, actual: usize },
	#[error("custom combination #{0} is empty")]
	EmptyCombination(usize),
	#[error("unknown selection mode `{0}`")]
	UnknownMode(String),
}

/// Which variable subsets to promote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
	/// Baseline plus the one named variable.
	Single(String),
	/// Baseline plus one configuration per variable.
	All,
	/// Baseline plus every unordered pair of variables.
	Pairs,
	SingleAndPairs,
	/// Baseline plus explicit combinations.
	Custom(Vec<Vec<String>>),
}

impl SelectionMode {
	/// Builds a mode from its name, the `single` variable and the `custom` combinations.
	pub fn parse(name: &str, variable: Option<&str>, custom: &[Vec<String>]) -> Result<Self, SpaceError> {
		match name {
			"single" => variable.map(|v| Self::Single(v.to_owned())).ok_or(SpaceError::MissingVariable),
			"all" => Ok(Self::All),
			"pairs" => Ok(Self::Pairs),
			"single_and_pairs" => Ok(Self::SingleAndPairs),
			"custom" => Ok(Self::Custom(custom.to_vec())),
			other => Err(SpaceError::UnknownMode(other.to_owned())),
		}
	}

	pub const fn name(&self) -> &'static str {
		match self {
			Self::Single(_) => "single",
			Self::All => "all",
			Self::Pairs => "pairs",
			Self::SingleAndPairs => "single_and_pairs",
			Self::Custom(_) => "custom",
		}
	}
}

impl fmt::Display for SelectionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Generates the configurations selected by `mode` over `variables`.
///
/// Repeated input names are ignored; single configurations follow input
/// order and pairs follow input-order combinations.
pub fn generate(variables: &[String], mode: &SelectionMode, target: FloatType) -> Result<Vec<Configuration>, SpaceError> {
	let vars: Vec<&str> = variables.iter().map(String::as_str).unique().collect();
	let known: BTreeSet<&str> = vars.iter().copied().collect();
	let single = |name: &str| Configuration::promoting([name], target);

	let mut configs = vec![Configuration::baseline()];
	match mode {
		SelectionMode::Single(name) => {
			if !known.contains(name.as_str()) {
				return Err(SpaceError::UnknownVariable(name.clone()));
			}
			configs.push(single(name.as_str()));
		}
		SelectionMode::All => configs.extend(vars.iter().map(|&v| single(v))),
		SelectionMode::Pairs => configs.extend(pairs(&vars, target)?),
		SelectionMode::SingleAndPairs => {
			configs.extend(vars.iter().map(|&v| single(v)));
			configs.extend(pairs(&vars, target)?);
		}
		SelectionMode::Custom(combos) => {
			for (index, combo) in combos.iter().enumerate() {
				if combo.is_empty() {
					return Err(SpaceError::EmptyCombination(index));
				}
				if let Some(unknown) = combo.iter().find(|v| !known.contains(v.as_str())) {
					return Err(SpaceError::UnknownVariable(unknown.clone()));
				}
				configs.push(Configuration::promoting(combo.iter().cloned(), target));
			}
		}
	}

	let mut names = BTreeSet::new();
	if let Some(dup) = configs.iter().find(|c| !names.insert(c.name.as_str())) {
		return Err(SpaceError::DuplicateName(dup.name.clone()));
	}
	Ok(configs)
}

fn pairs(vars: &[&str], target: FloatType) -> Result<Vec<Configuration>, SpaceError> {
	let generated: Vec<Configuration> = vars.iter().tuple_combinations().map(|(a, b)| Configuration::promoting([*a, *b], target)).collect();
	let n = vars.len();
	let expected = n * n.saturating_sub(1) / 2;
	if generated.len() != expected {
		return Err(SpaceError::PairCountMismatch {
			expected,
			actual: generated.len(),
		});
	}
	Ok(generated)
}

/// Crosses configurations with optimization levels and fast-math settings,
/// configuration-major.
pub fn cells(configurations: &[Configuration], opt_levels: &[OptLevel], fastmath: &[bool]) -> Vec<Cell> {
	configurations
		.iter()
		.cartesian_product(opt_levels)
		.cartesian_product(fastmath)
		.map(|((config, &opt), &fm)| Cell::new(config.clone(), opt, fm))
		.collect()
}
