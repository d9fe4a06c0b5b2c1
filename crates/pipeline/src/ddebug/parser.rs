//! Interpretation of the minimizer's output tree.
//!
//! ```text
//! dd.line/
//!   rddmin-cmp/dd.line.exclude   union of the minimal unstable sets
//!   rddmin-cmp/dd.line.include   instructions left untouched (stable)
//!   ddmin0/dd.line.include       one minimal unstable set
//!   ddmin1/dd.line.include       ...
//! ```
//!
//! Depending on the minimizer version the unstable lines show up in either the
//! top-level exclude file or the per-iteration include files, so both are read.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use numstab_primitives::DdminSet;
use regex::Regex;
use tracing::warn;

const TOP_LEVEL_DIR: &str = "rddmin-cmp";
const EXCLUDE_FILE: &str = "dd.line.exclude";
const INCLUDE_FILE: &str = "dd.line.include";
const DDMIN_PREFIX: &str = "ddmin";

/// `0x0000000000400e5c: archimedes at archimedes.c:16`, with address and
/// function optional.
static RECORD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*(?:(?P<address>0x[0-9a-fA-F]+):\s+)?(?:(?P<function>\S+)\s+at\s+)?(?P<file>[^\s:]+):(?P<line>\d+)\b")
		.expect("record regex")
});

/// One instruction location reported by the minimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
	pub address: Option<String>,
	pub function: Option<String>,
	pub file: String,
	pub line: u32,
}

impl LineRecord {
	/// Parses one result line. Unknown locations (line 0) yield `None`.
	pub fn parse(text: &str) -> Option<Self> {
		let caps = RECORD.captures(text)?;
		let line = caps["line"].parse().ok().filter(|&line: &u32| line != 0)?;
		Some(Self {
			address: caps.name("address").map(|m| m.as_str().to_owned()),
			function: caps.name("function").map(|m| m.as_str().to_owned()),
			file: caps["file"].to_owned(),
			line,
		})
	}
}

/// Records of one result file. Missing files are empty.
pub fn parse_file(path: &Path) -> Vec<LineRecord> {
	let text = match std::fs::read_to_string(path) {
		Ok(text) => text,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
		Err(err) => {
			warn!(path = %path.display(), error = %err, "Cannot read minimizer result file");
			return Vec::new();
		}
	};
	text.lines().filter_map(LineRecord::parse).collect()
}

fn line_set(path: &Path) -> BTreeSet<u32> {
	parse_file(path).into_iter().map(|r| r.line).collect()
}

/// Everything extracted from one minimizer output tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinimizerResult {
	pub unstable_lines: BTreeSet<u32>,
	/// Per-iteration minimal sets, ordered by directory name.
	pub ddmin_sets: Vec<DdminSet>,
	pub stable_lines: BTreeSet<u32>,
}

/// Parses the tree rooted at `dir` (normally `<workspace>/dd.line`).
pub fn parse_tree(dir: &Path) -> MinimizerResult {
	let top = dir.join(TOP_LEVEL_DIR);
	let mut unstable_lines = line_set(&top.join(EXCLUDE_FILE));
	let stable_lines = line_set(&top.join(INCLUDE_FILE));

	let mut ddmin_dirs: Vec<(String, std::path::PathBuf)> = match std::fs::read_dir(dir) {
		Ok(entries) => entries
			.filter_map(|entry| entry.ok())
			.filter(|entry| entry.path().is_dir())
			.filter_map(|entry| {
				let name = entry.file_name().to_str()?.to_owned();
				name.starts_with(DDMIN_PREFIX).then(|| (name, entry.path()))
			})
			.collect(),
		Err(_) => Vec::new(),
	};
	ddmin_dirs.sort_by(|(a, _), (b, _)| iteration_key(a).cmp(&iteration_key(b)));

	let mut ddmin_sets = Vec::new();
	for (set_name, path) in ddmin_dirs {
		let include = path.join(INCLUDE_FILE);
		if !include.exists() {
			continue;
		}
		let lines = line_set(&include);
		unstable_lines.extend(&lines);
		ddmin_sets.push(DdminSet { set_name, lines });
	}

	MinimizerResult {
		unstable_lines,
		ddmin_sets,
		stable_lines,
	}
}

/// Orders `ddmin<N>` directories by iteration number, unnumbered names last.
fn iteration_key(name: &str) -> (u64, &str) {
	let number = name.strip_prefix(DDMIN_PREFIX).and_then(|n| n.parse().ok()).unwrap_or(u64::MAX);
	(number, name)
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("0x0000000000400e5c: archimedes at archimedes.c:16", Some(("archimedes.c", 16)))]
	#[case("  0x1: f at src.c:17  ", Some(("src.c", 17)))]
	#[case("0x4011d6: main at /tmp/build/src.c:42 (discriminator 3)", Some(("/tmp/build/src.c", 42)))]
	#[case("src.c:9", Some(("src.c", 9)))]
	#[case("0x1: f at ??:0", None)]
	#[case("ddmin: nothing to report", None)]
	#[case("", None)]
	fn record_shapes(#[case] text: &str, #[case] expected: Option<(&str, u32)>) {
		let parsed = LineRecord::parse(text).map(|r| (r.file, r.line));
		assert_eq!(parsed.as_ref().map(|(f, l)| (f.as_str(), *l)), expected);
	}

	#[test]
	fn descriptive_fields_are_kept() {
		let record = LineRecord::parse("0x2: archimedes at archimedes.c:16").unwrap();
		assert_eq!(record.address.as_deref(), Some("0x2"));
		assert_eq!(record.function.as_deref(), Some("archimedes"));
	}

	fn write(dir: &Path, rel: &str, text: &str) {
		let path = dir.join(rel);
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(path, text).unwrap();
	}

	#[test]
	fn excluded_set_is_sorted_and_deduplicated() {
		let dir = tempfile::tempdir().unwrap();
		write(dir.path(), "rddmin-cmp/dd.line.exclude", "0x2: f at src.c:17\n0x1: f at src.c:16\n0x3: f at src.c:16\n");

		let result = parse_tree(dir.path());
		assert_eq!(result.unstable_lines.into_iter().collect::<Vec<_>>(), [16, 17]);
		assert!(result.ddmin_sets.is_empty());
	}

	#[test]
	fn iteration_sets_join_the_union() {
		let dir = tempfile::tempdir().unwrap();
		write(dir.path(), "rddmin-cmp/dd.line.exclude", "0x1: f at src.c:16\n");
		write(dir.path(), "rddmin-cmp/dd.line.include", "0x5: f at src.c:8\n0x6: f at src.c:9\n");
		write(dir.path(), "ddmin1/dd.line.include", "0x7: f at src.c:21\n");
		write(dir.path(), "ddmin0/dd.line.include", "0x1: f at src.c:16\n0x9: g at src.c:30\n");
		write(dir.path(), "ddmin10/dd.line.include", "0x8: f at src.c:40\n");
		write(dir.path(), "ddmin2/dd.line.include", "0x7: f at src.c:21\n");
		std::fs::create_dir_all(dir.path().join("ddmin3")).unwrap();

		let result = parse_tree(dir.path());
		assert_eq!(result.unstable_lines.iter().copied().collect::<Vec<_>>(), [16, 21, 30, 40]);
		assert_eq!(result.stable_lines.iter().copied().collect::<Vec<_>>(), [8, 9]);
		let names: Vec<&str> = result.ddmin_sets.iter().map(|s| s.set_name.as_str()).collect();
		assert_eq!(names, ["ddmin0", "ddmin1", "ddmin2", "ddmin10"]);
	}

	#[test]
	fn missing_tree_is_empty() {
		let dir = tempfile::tempdir().unwrap();
		assert_eq!(parse_tree(&dir.path().join("dd.line")), MinimizerResult::default());
	}
}
