use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Floating-point declaration type recognized in target sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatType {
	/// Reduced precision (`float`).
	Float,
	/// Full precision (`double`).
	Double,
}

impl FloatType {
	/// Every recognized type, reduced first.
	pub const ALL: [Self; 2] = [Self::Float, Self::Double];

	/// Source keyword for this type.
	pub const fn keyword(self) -> &'static str {
		match self {
			Self::Float => "float",
			Self::Double => "double",
		}
	}

	/// Parses a source keyword.
	pub fn from_keyword(keyword: &str) -> Option<Self> {
		match keyword {
			"float" => Some(Self::Float),
			"double" => Some(Self::Double),
			_ => None,
		}
	}
}

impl fmt::Display for FloatType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.keyword())
	}
}

/// Error returned when a string is not a recognized floating-point keyword.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown floating-point type `{0}` (expected `float` or `double`)")]
pub struct ParseFloatTypeError(pub String);

impl FromStr for FloatType {
	type Err = ParseFloatTypeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_keyword(s).ok_or_else(|| ParseFloatTypeError(s.to_owned()))
	}
}

/// Declaration scope of a variable.
///
/// Serialized as the enclosing function name, or `"global"` for file scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
	Global,
	Function(String),
}

impl Scope {
	const GLOBAL: &'static str = "global";

	/// Scope for an optional function name.
	pub fn from_function(function: Option<&str>) -> Self {
		match function {
			Some(name) => Self::Function(name.to_owned()),
			None => Self::Global,
		}
	}

	/// Enclosing function name, `None` for file scope.
	pub fn function(&self) -> Option<&str> {
		match self {
			Self::Global => None,
			Self::Function(name) => Some(name),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			Self::Global => Self::GLOBAL,
			Self::Function(name) => name,
		}
	}
}

impl From<String> for Scope {
	fn from(value: String) -> Self {
		if value == Self::GLOBAL { Self::Global } else { Self::Function(value) }
	}
}

impl From<Scope> for String {
	fn from(value: Scope) -> Self {
		match value {
			Scope::Global => Scope::GLOBAL.to_owned(),
			Scope::Function(name) => name,
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One floating-point variable declaration found in the target source.
///
/// Identity is `(name, scope)`; the record is never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
	pub name: String,
	#[serde(rename = "type")]
	pub ty: FloatType,
	/// 1-based source line of the declaration.
	pub line: usize,
	pub scope: Scope,
	/// Trimmed text of the declaring line.
	pub declaration: String,
}
