//! Declaration statement scanning shared by the catalog and the mutator.

use std::ops::Range;
use std::sync::LazyLock;

use numstab_primitives::FloatType;
use regex::Regex;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?P<quals>(?:\b(?:const|static|register|volatile|extern)[ \t]+)*)\b(?P<ty>float|double)(?P<ws>[ \t]+)(?P<list>[A-Za-z_*(][^;{}\n]*);")
		.expect("declaration pattern is valid")
});

static IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern is valid"));

/// C keywords that can follow a type keyword but never name a variable.
const NOT_A_NAME: &[&str] = &["const", "volatile", "restrict", "register", "static", "inline", "int", "long", "short", "unsigned", "signed"];

/// One comma-separated entry of a declaration list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declarator {
	/// Byte range in the source, trimmed of surrounding whitespace.
	pub range: Range<usize>,
	/// Set only for `name` or `name = init`; pointers, arrays and function
	/// declarators are kept as opaque text.
	pub name: Option<String>,
}

/// A `[qualifiers] float|double declarator, ...;` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
	pub ty: FloatType,
	/// From the first qualifier (or the type keyword) through the terminating `;`.
	pub statement: Range<usize>,
	pub qualifiers: Range<usize>,
	pub keyword: Range<usize>,
	pub separator: Range<usize>,
	pub declarators: Vec<Declarator>,
	/// 1-based line of the type keyword.
	pub line: usize,
	/// The preceding token ends a statement or block. Only such
	/// declarations are cataloged or split into several statements.
	pub starts_statement: bool,
}

impl Declaration {
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.declarators.iter().filter_map(|d| d.name.as_deref())
	}

	pub fn declares(&self, name: &str) -> bool {
		self.names().any(|n| n == name)
	}
}

/// Byte offsets at which each line starts.
pub(crate) struct LineIndex {
	starts: Vec<usize>,
}

impl LineIndex {
	pub fn new(text: &str) -> Self {
		let starts = std::iter::once(0).chain(text.match_indices('\n').map(|(i, _)| i + 1)).collect();
		Self { starts }
	}

	/// 1-based line containing `offset`.
	pub fn line_of(&self, offset: usize) -> usize {
		self.starts.partition_point(|&start| start <= offset)
	}

	/// Byte range of 1-based `line`, without its newline.
	pub fn line_range(&self, line: usize, text: &str) -> Range<usize> {
		let start = self.starts[line - 1];
		let end = self.starts.get(line).map_or(text.len(), |next| next - 1);
		start..end
	}
}

/// Scans masked text (see [`crate::mask`]) for floating-point declarations.
///
/// Offsets refer equally to the masked text and the source it came from.
pub(crate) fn scan(masked: &str) -> Vec<Declaration> {
	let lines = LineIndex::new(masked);
	DECLARATION
		.captures_iter(masked)
		.filter_map(|caps| {
			let whole = caps.get(0)?;
			let quals = caps.name("quals")?;
			let ty = caps.name("ty")?;
			let ws = caps.name("ws")?;
			let list = caps.name("list")?;

			let before = masked[..whole.start()].trim_end();
			if is_word_end(before, "long") {
				return None;
			}

			let starts_statement = before.chars().next_back().is_none_or(|c| matches!(c, ';' | '{' | '}')) || ends_directive(before);

			Some(Declaration {
				ty: FloatType::from_keyword(ty.as_str())?,
				statement: whole.range(),
				qualifiers: quals.range(),
				keyword: ty.range(),
				separator: ws.range(),
				declarators: split_declarators(masked, list.range()),
				line: lines.line_of(ty.start()),
				starts_statement,
			})
		})
		.collect()
}

/// The last line of `text` is a preprocessor directive (`#include`, `#define`, `#endif`, ...).
fn ends_directive(text: &str) -> bool {
	text.rsplit('\n').next().is_some_and(|line| line.trim_start().starts_with('#'))
}

/// `text` ends with the standalone word `word`.
fn is_word_end(text: &str, word: &str) -> bool {
	text.strip_suffix(word)
		.is_some_and(|head| !head.ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_'))
}

fn split_declarators(masked: &str, list: Range<usize>) -> Vec<Declarator> {
	let bytes = masked.as_bytes();
	let mut pieces = Vec::new();
	let mut depth = 0usize;
	let mut start = list.start;
	for i in list.clone() {
		match bytes[i] {
			b'(' | b'[' => depth += 1,
			b')' | b']' => depth = depth.saturating_sub(1),
			b',' if depth == 0 => {
				pieces.push(start..i);
				start = i + 1;
			}
			_ => {}
		}
	}
	pieces.push(start..list.end);

	pieces.into_iter().filter_map(|piece| declarator(masked, piece)).collect()
}

fn declarator(masked: &str, piece: Range<usize>) -> Option<Declarator> {
	let text = &masked[piece.clone()];
	let leading = text.len() - text.trim_start().len();
	let trimmed = text.trim();
	if trimmed.is_empty() {
		return None;
	}
	let range = piece.start + leading..piece.start + leading + trimmed.len();

	let name = IDENT.find(trimmed).and_then(|ident| {
		let rest = trimmed[ident.end()..].trim_start();
		let plain = rest.is_empty() || (rest.starts_with('=') && !rest.starts_with("=="));
		(plain && !NOT_A_NAME.contains(&ident.as_str())).then(|| ident.as_str().to_owned())
	});

	Some(Declarator { range, name })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mask::scannable;

	fn names(decl: &Declaration) -> Vec<&str> {
		decl.names().collect()
	}

	#[test]
	fn single_and_list_declarations() {
		let src = "double a;\nfloat b = 1.0f, c, d = g(1, 2);\n";
		let decls = scan(&scannable(src));
		assert_eq!(decls.len(), 2);
		assert_eq!(decls[0].ty, FloatType::Double);
		assert_eq!(names(&decls[0]), ["a"]);
		assert_eq!(decls[1].line, 2);
		assert_eq!(names(&decls[1]), ["b", "c", "d"]);
		assert_eq!(&src[decls[1].declarators[2].range.clone()], "d = g(1, 2)");
	}

	#[test]
	fn pointers_arrays_and_prototypes_are_opaque() {
		let src = "double *p, q, r[4];\ndouble f(double x, double y);\n";
		let decls = scan(&scannable(src));
		assert_eq!(names(&decls[0]), ["q"]);
		assert_eq!(decls[0].declarators.len(), 3);
		assert_eq!(decls.len(), 2);
		assert!(names(&decls[1]).is_empty());
	}

	#[test]
	fn qualifiers_belong_to_the_statement() {
		let src = "static const double eps = 1e-9;\n";
		let decl = &scan(&scannable(src))[0];
		assert_eq!(&src[decl.qualifiers.clone()], "static const ");
		assert_eq!(decl.statement.start, 0);
		assert!(decl.starts_statement);
	}

	#[test]
	fn directives_end_statements() {
		let src = "#include <stdio.h>\ndouble a, b;\n#define N 10\nfloat c;\n#endif\n  double d;\n";
		let decls = scan(&scannable(src));
		assert_eq!(decls.len(), 3);
		assert!(decls.iter().all(|d| d.starts_statement));
	}

	#[test]
	fn for_headers_do_not_start_statements() {
		let src = "void g() {\n  for (double i = 0, j = 1; i < 1; i++) {}\n}\n";
		let decl = &scan(&scannable(src))[0];
		assert_eq!(names(decl), ["i", "j"]);
		assert!(!decl.starts_statement);
	}

	#[test]
	fn function_definitions_and_casts_are_ignored() {
		let src = "double f(double x)\n{\n  return (double) x;\n}\n";
		assert!(scan(&scannable(src)).is_empty());
	}

	#[test]
	fn long_double_is_not_double() {
		let src = "long double wide;\ndouble narrow;\n";
		let decls = scan(&scannable(src));
		assert_eq!(decls.len(), 1);
		assert_eq!(names(&decls[0]), ["narrow"]);
	}

	#[test]
	fn line_index_maps_offsets() {
		let text = "a\nbc\n\nd";
		let index = LineIndex::new(text);
		assert_eq!(index.line_of(0), 1);
		assert_eq!(index.line_of(3), 2);
		assert_eq!(index.line_of(5), 3);
		assert_eq!(index.line_of(6), 4);
		assert_eq!(index.line_range(2, text), 2..4);
		assert_eq!(index.line_range(4, text), 6..7);
	}
}
