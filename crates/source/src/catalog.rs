//! Variable catalog extraction.

use std::ops::Range;
use std::sync::LazyLock;

use numstab_primitives::{Scope, Variable};
use regex::Regex;
use tracing::{debug, warn};

use crate::decl::{self, LineIndex};
use crate::mask::{scannable, strip_comments};

static FUNCTION_HEAD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?m)^[ \t]*(?:[A-Za-z_][A-Za-z0-9_]*[ \t*]+)+\**(?P<name>[A-Za-z_][A-Za-z0-9_]*)[ \t]*\([^;{}]*\)[ \t\r\n]*\{")
		.expect("function head pattern is valid")
});

const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "return", "sizeof", "do", "else"];

/// A function definition located in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
	pub name: String,
	/// 1-based line of the function head.
	pub start_line: usize,
	/// 1-based line of the closing brace.
	pub end_line: usize,
	/// Byte range of the body, braces included.
	pub body: Range<usize>,
}

impl FunctionSpan {
	pub(crate) fn contains(&self, offset: usize) -> bool {
		self.body.contains(&offset)
	}
}

/// Lists function definitions in source order.
pub fn find_functions(source: &str) -> Vec<FunctionSpan> {
	let masked = scannable(source);
	functions_in(&masked)
}

pub(crate) fn functions_in(masked: &str) -> Vec<FunctionSpan> {
	let lines = LineIndex::new(masked);
	let mut spans = Vec::new();
	let mut resume = 0;

	for caps in FUNCTION_HEAD.captures_iter(masked) {
		let (Some(head), Some(name)) = (caps.get(0), caps.name("name")) else {
			continue;
		};
		if head.start() < resume || CONTROL_KEYWORDS.contains(&name.as_str()) {
			continue;
		}
		let open = head.end() - 1;
		let close = matching_brace(masked, open).unwrap_or(masked.len().saturating_sub(1));
		resume = close + 1;
		spans.push(FunctionSpan {
			name: name.as_str().to_owned(),
			start_line: lines.line_of(name.start()),
			end_line: lines.line_of(close),
			body: open..close + 1,
		});
	}
	spans
}

fn matching_brace(masked: &str, open: usize) -> Option<usize> {
	let mut depth = 0usize;
	for (i, b) in masked.bytes().enumerate().skip(open) {
		match b {
			b'{' => depth += 1,
			b'}' => {
				depth -= 1;
				if depth == 0 {
					return Some(i);
				}
			}
			_ => {}
		}
	}
	None
}

/// Extracts `float` and `double` variable declarations.
///
/// With `function` set, only declarations inside that function's body are
/// returned; an unknown function yields an empty catalog. Without it, the
/// whole file is scanned and each variable is scoped to its enclosing
/// function, or [`Scope::Global`] outside any function.
///
/// Only declarations in statement position are recorded, so `for` headers,
/// casts and parameter lists are skipped. Comments never produce entries.
pub fn extract(source: &str, function: Option<&str>) -> Vec<Variable> {
	let masked = scannable(source);
	let stripped = strip_comments(source);
	let functions = functions_in(&masked);

	let target = match function {
		Some(name) => match functions.iter().find(|span| span.name == name) {
			Some(span) => Some(span),
			None => {
				warn!(function = name, "Function not found; catalog is empty");
				return Vec::new();
			}
		},
		None => None,
	};

	let lines = LineIndex::new(&masked);
	let mut variables = Vec::new();
	for declaration in decl::scan(&masked) {
		if !declaration.starts_statement {
			continue;
		}
		let offset = declaration.keyword.start;
		let scope = match target {
			Some(span) if span.contains(offset) => Scope::Function(span.name.clone()),
			Some(_) => continue,
			None => Scope::from_function(functions.iter().find(|span| span.contains(offset)).map(|span| span.name.as_str())),
		};
		let text = stripped[lines.line_range(declaration.line, &stripped)].trim().to_owned();
		for name in declaration.names() {
			variables.push(Variable {
				name: name.to_owned(),
				ty: declaration.ty,
				line: declaration.line,
				scope: scope.clone(),
				declaration: text.clone(),
			});
		}
	}

	debug!(count = variables.len(), function = function.unwrap_or("global"), "Extracted variable catalog");
	variables
}

#[cfg(test)]
mod tests {
	use numstab_primitives::FloatType;
	use rstest::rstest;

	use super::*;

	const ARCHIMEDES: &str = "\
#include <stdio.h>

double scale = 2.0;

double f(int n)
{
  double ti, tii;
  double s = 0.0; // double hidden;
  /* float ghost; */
  int i;
  ti = 1.0 / 3.0;
  for (i = 0; i < n; i++) {
    tii = ti * 0.5;
    s += tii;
  }
  return s;
}

int main(void)
{
  float out = (float) f(10);
  printf(\"%.17g\\n\", (double) out);
  return 0;
}
";

	#[test]
	fn finds_function_spans() {
		let spans = find_functions(ARCHIMEDES);
		let names: Vec<_> = spans.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["f", "main"]);
		assert_eq!(spans[0].start_line, 5);
		assert_eq!(spans[0].end_line, 17);
		assert_eq!(spans[1].start_line, 19);
	}

	#[test]
	fn function_scope_lists_its_declarations() {
		let vars = extract(ARCHIMEDES, Some("f"));
		let names: Vec<_> = vars.iter().map(|v| v.name.as_str()).collect();
		assert_eq!(names, ["ti", "tii", "s"]);
		assert!(vars.iter().all(|v| v.scope == Scope::Function("f".into())));
		assert!(vars.iter().all(|v| v.ty == FloatType::Double));
		assert_eq!(vars[0].line, 7);
		assert_eq!(vars[0].declaration, "double ti, tii;");
		assert_eq!(vars[2].declaration, "double s = 0.0;");
	}

	#[test]
	fn whole_file_scopes_each_variable() {
		let vars = extract(ARCHIMEDES, None);
		let keys: Vec<_> = vars.iter().map(|v| (v.name.as_str(), v.scope.as_str())).collect();
		assert_eq!(keys, [("scale", "global"), ("ti", "f"), ("tii", "f"), ("s", "f"), ("out", "main")]);
		assert_eq!(vars[4].ty, FloatType::Float);
	}

	#[test]
	fn missing_function_is_empty() {
		assert!(extract(ARCHIMEDES, Some("nope")).is_empty());
	}

	#[rstest]
	#[case("// double a;\n", 0)]
	#[case("/*\ndouble a;\n*/\n", 0)]
	#[case("char *s = \"double a;\";\n", 0)]
	#[case("  double a; /* trailing */\n", 1)]
	#[case("x = 1; double a;\n", 1)]
	#[case("for (double a = 0; a < 1; a++) {}\n", 0)]
	#[case("long double a;\n", 0)]
	#[case("#include <math.h>\ndouble a, b;\n", 2)]
	#[case("#define N 10\n\nstatic double a = N;\n", 1)]
	fn comment_and_anchor_cases(#[case] src: &str, #[case] expected: usize) {
		assert_eq!(extract(src, None).len(), expected);
	}

	#[test]
	fn control_flow_is_not_a_function() {
		let src = "int main(void)\n{\n  if (x) {\n    double y = 1;\n  }\n}\n";
		let spans = find_functions(src);
		assert_eq!(spans.len(), 1);
		let vars = extract(src, Some("main"));
		assert_eq!(vars.len(), 1);
		assert_eq!(vars[0].name, "y");
	}
}
