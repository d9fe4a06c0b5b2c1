use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::FloatType;

/// Name of the configuration that promotes no variable.
pub const BASELINE_NAME: &str = "baseline";

/// A named subset of variables promoted from full to reduced precision.
///
/// An empty `variables` set denotes the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
	pub name: String,
	pub variables: BTreeSet<String>,
}

impl Configuration {
	/// The baseline configuration.
	pub fn baseline() -> Self {
		Self {
			name: BASELINE_NAME.to_owned(),
			variables: BTreeSet::new(),
		}
	}

	/// Configuration promoting `variables` to `target`, named canonically.
	///
	/// An empty input yields the baseline.
	pub fn promoting<I, S>(variables: I, target: FloatType) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let variables: BTreeSet<String> = variables.into_iter().map(Into::into).collect();
		if variables.is_empty() {
			return Self::baseline();
		}
		Self {
			name: Self::canonical_name(&variables, target),
			variables,
		}
	}

	/// Sorted member names joined with `_`, suffixed with the target keyword.
	pub fn canonical_name(variables: &BTreeSet<String>, target: FloatType) -> String {
		if variables.is_empty() {
			return BASELINE_NAME.to_owned();
		}
		let mut name = variables.iter().map(String::as_str).collect::<Vec<_>>().join("_");
		name.push('_');
		name.push_str(target.keyword());
		name
	}

	pub fn is_baseline(&self) -> bool {
		self.variables.is_empty()
	}
}
