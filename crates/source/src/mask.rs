//! Length-preserving masking of C comments and literals.
//!
//! Masked bytes become ASCII spaces while newlines are kept, so byte offsets
//! and line numbers of the masked text match the original exactly.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Code,
	LineComment,
	BlockComment,
	Str,
	Char,
}

/// Replaces every comment with spaces, keeping newlines.
pub fn strip_comments(source: &str) -> String {
	mask(source, false)
}

/// Masks comments and the contents of string and character literals.
///
/// Quote characters stay in place so literals remain visible as tokens.
pub(crate) fn scannable(source: &str) -> String {
	mask(source, true)
}

fn mask(source: &str, literals: bool) -> String {
	let bytes = source.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut state = State::Code;
	let mut i = 0;

	let blank = |b: u8| if b == b'\n' { b'\n' } else { b' ' };

	while i < bytes.len() {
		let b = bytes[i];
		let next = bytes.get(i + 1).copied();
		match state {
			State::Code => match (b, next) {
				(b'/', Some(b'/')) => {
					out.extend_from_slice(b"  ");
					state = State::LineComment;
					i += 2;
					continue;
				}
				(b'/', Some(b'*')) => {
					out.extend_from_slice(b"  ");
					state = State::BlockComment;
					i += 2;
					continue;
				}
				(b'"', _) => {
					out.push(b);
					state = State::Str;
				}
				(b'\'', _) => {
					out.push(b);
					state = State::Char;
				}
				_ => out.push(b),
			},
			State::LineComment => {
				if b == b'\n' {
					state = State::Code;
				}
				out.push(blank(b));
			}
			State::BlockComment => {
				if b == b'*' && next == Some(b'/') {
					out.extend_from_slice(b"  ");
					state = State::Code;
					i += 2;
					continue;
				}
				out.push(blank(b));
			}
			State::Str | State::Char => {
				let quote = if state == State::Str { b'"' } else { b'\'' };
				if b == b'\\' && next.is_some_and(|n| n != b'\n') {
					if literals {
						out.extend_from_slice(b"  ");
					} else {
						out.push(b);
						out.extend_from_slice(&bytes[i + 1..i + 2]);
					}
					i += 2;
					continue;
				}
				if b == quote || b == b'\n' {
					out.push(b);
					state = State::Code;
				} else if literals {
					out.push(blank(b));
				} else {
					out.push(b);
				}
			}
		}
		i += 1;
	}

	// Only whole bytes of multi-byte characters are ever replaced, each by an
	// ASCII space, so the output is still valid UTF-8.
	String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn comments_are_blanked_in_place() {
		let src = "double a; // double b;\n/* double c;\n double d; */ double e;\n";
		let masked = strip_comments(src);
		assert_eq!(masked.len(), src.len());
		assert_eq!(masked.lines().count(), src.lines().count());
		assert!(masked.contains("double a;"));
		assert!(!masked.contains("double b"));
		assert!(!masked.contains("double c"));
		assert!(!masked.contains("double d"));
		assert!(masked.contains("double e;"));
	}

	#[test]
	fn comment_markers_inside_strings_are_code() {
		let src = "printf(\"// not a comment\"); double x;\n";
		assert_eq!(strip_comments(src), src);
	}

	#[test]
	fn literal_contents_are_masked_for_scanning() {
		let src = "puts(\"double x;\"); char c = '\\'';\n";
		let masked = scannable(src);
		assert_eq!(masked.len(), src.len());
		assert!(!masked.contains("double"));
		assert!(masked.starts_with("puts(\""));
	}

	#[test]
	fn multibyte_comment_text_keeps_length() {
		let src = "// précision ✓\ndouble x;\n";
		let masked = strip_comments(src);
		assert_eq!(masked.len(), src.len());
		assert!(masked.ends_with("double x;\n"));
	}
}
