//! Precision mutation and post-mutation verification.

use std::collections::BTreeSet;
use std::ops::Range;

use numstab_primitives::FloatType;
use tracing::{debug, trace, warn};

use crate::catalog::functions_in;
use crate::decl::{self, Declaration};
use crate::mask::scannable;

/// Result of re-scanning a mutated source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
	/// Requested variables with no declaration of the target type.
	pub failed: Vec<String>,
}

impl Verification {
	pub fn all_ok(&self) -> bool {
		self.failed.is_empty()
	}
}

/// Rewrites the declarations of `variables` to `target`.
///
/// Only the type of the named declarators changes. A declaration list that
/// mixes named and unnamed declarators is split into consecutive statements
/// so the other declarators keep their type; every byte outside the rewritten
/// statements is preserved. Declarations inside comments and string literals
/// are never touched, and an empty `variables` set returns `source` unchanged.
///
/// With `function` set, only declarations inside that function's body are
/// rewritten, so same-named variables of other functions keep their type. An
/// unknown function leaves the source unchanged.
pub fn mutate(source: &str, function: Option<&str>, variables: &BTreeSet<String>, target: FloatType) -> String {
	if variables.is_empty() {
		return source.to_owned();
	}

	let masked = scannable(source);
	let Some(region) = region(&masked, function) else {
		warn!(function = function.unwrap_or_default(), "Function not found; nothing to mutate");
		return source.to_owned();
	};
	let edits: Vec<(Range<usize>, String)> = decl::scan(&masked)
		.iter()
		.filter(|declaration| region.contains(&declaration.keyword.start))
		.filter_map(|declaration| rewrite(source, declaration, variables, target))
		.collect();

	debug!(edits = edits.len(), variables = variables.len(), target = %target, "Mutated declarations");

	let mut out = String::with_capacity(source.len() + edits.len() * 8);
	let mut cursor = 0;
	for (range, replacement) in edits {
		out.push_str(&source[cursor..range.start]);
		out.push_str(&replacement);
		cursor = range.end;
	}
	out.push_str(&source[cursor..]);
	out
}

/// Byte range of the masked text that `function` confines edits to.
fn region(masked: &str, function: Option<&str>) -> Option<Range<usize>> {
	match function {
		None => Some(0..masked.len()),
		Some(name) => functions_in(masked).into_iter().find(|span| span.name == name).map(|span| span.body),
	}
}

fn rewrite(source: &str, declaration: &Declaration, variables: &BTreeSet<String>, target: FloatType) -> Option<(Range<usize>, String)> {
	let types: Vec<FloatType> = declaration
		.declarators
		.iter()
		.map(|d| match &d.name {
			Some(name) if variables.contains(name) => target,
			_ => declaration.ty,
		})
		.collect();

	if types.iter().all(|&ty| ty == declaration.ty) {
		return None;
	}
	if types.iter().all(|&ty| ty == target) {
		return Some((declaration.keyword.clone(), target.keyword().to_owned()));
	}
	if !declaration.starts_statement {
		trace!(line = declaration.line, "Mixed declaration list cannot be split here; left unchanged");
		return None;
	}

	let qualifiers = &source[declaration.qualifiers.clone()];
	let separator = &source[declaration.separator.clone()];
	let mut statements = Vec::new();
	let mut group_start = 0;
	for i in 1..=types.len() {
		if i < types.len() && types[i] == types[group_start] {
			continue;
		}
		let first = &declaration.declarators[group_start].range;
		let last = &declaration.declarators[i - 1].range;
		statements.push(format!("{qualifiers}{}{separator}{};", types[group_start].keyword(), &source[first.start..last.end]));
		group_start = i;
	}

	Some((declaration.statement.clone(), statements.join(" ")))
}

/// Checks that every name in `variables` is declared with `target` in `mutated`.
///
/// Comments and string literals are ignored, so a commented-out declaration
/// never counts as a successful rewrite. With `function` set, only that
/// function's body is searched.
pub fn verify(mutated: &str, function: Option<&str>, variables: &BTreeSet<String>, target: FloatType) -> Verification {
	let masked = scannable(mutated);
	let region = region(&masked, function).unwrap_or(0..0);
	let declarations: Vec<Declaration> = decl::scan(&masked).into_iter().filter(|d| region.contains(&d.keyword.start)).collect();
	let failed = variables
		.iter()
		.filter(|name| !declarations.iter().any(|d| d.ty == target && d.declares(name)))
		.cloned()
		.collect();
	Verification { failed }
}
