use std::path::Path;

use numstab_primitives::{CatalogManifest, Scope};
use tracing::{debug, info};

use crate::store::write_manifest;
use crate::{PipelineError, Result};

/// Catalogs the floating-point variables of `source`, optionally limited to
/// one function, and writes the catalog manifest to `output`.
///
/// A missing function and a scope without variables are both setup errors.
pub fn analyze(source: &Path, function: Option<&str>, output: &Path) -> Result<CatalogManifest> {
	if !source.is_file() {
		return Err(PipelineError::SourceNotFound(source.to_path_buf()));
	}
	let text = std::fs::read_to_string(source).map_err(|err| PipelineError::Read {
		path: source.to_path_buf(),
		source: err,
	})?;

	let functions = numstab_source::find_functions(&text);
	for f in &functions {
		debug!(function = %f.name, start = f.start_line, end = f.end_line, "Found function");
	}

	let scope = Scope::from_function(function);
	let variables = numstab_source::extract(&text, function);
	if variables.is_empty() {
		return Err(PipelineError::NoVariables { scope: scope.to_string() });
	}

	let manifest = CatalogManifest::new(source.to_path_buf(), scope, variables);
	write_manifest("catalog", output, &manifest)?;
	info!(
		source = %source.display(),
		scope = %manifest.function,
		functions = functions.len(),
		variables = manifest.variables.len(),
		output = %output.display(),
		"Catalog written"
	);
	Ok(manifest)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::read_manifest;

	const SOURCE: &str = "\
#include <stdio.h>

double pi_term(int n) {
\tdouble ti = 1.0, tii;
\tfloat s = 0.0f; // already reduced
\ttii = ti / n;
\treturn tii + s;
}

int main(void) {
\tdouble out = pi_term(3);
\tprintf(\"%.15f\\n\", out);
\treturn 0;
}
";

	#[test]
	fn function_scope_is_recorded() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("pi.c");
		std::fs::write(&source, SOURCE).unwrap();
		let output = dir.path().join("catalog.json");

		let manifest = analyze(&source, Some("pi_term"), &output).unwrap();
		let names: Vec<&str> = manifest.variables.iter().map(|v| v.name.as_str()).collect();
		assert_eq!(names, ["ti", "tii", "s"]);
		assert_eq!(manifest.function, Scope::Function("pi_term".into()));

		let on_disk: CatalogManifest = read_manifest("catalog", &output).unwrap();
		assert_eq!(on_disk.variables, manifest.variables);
	}

	#[test]
	fn unknown_function_has_no_variables() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("pi.c");
		std::fs::write(&source, SOURCE).unwrap();
		let err = analyze(&source, Some("missing"), &dir.path().join("catalog.json")).unwrap_err();
		assert!(matches!(err, PipelineError::NoVariables { ref scope } if scope == "missing"));
	}

	#[test]
	fn missing_source_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let err = analyze(&dir.path().join("nope.c"), None, &dir.path().join("catalog.json")).unwrap_err();
		assert!(matches!(err, PipelineError::SourceNotFound(_)));
	}
}
