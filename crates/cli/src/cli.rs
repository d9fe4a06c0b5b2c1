use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

const MODES: [&str; 5] = ["single", "all", "pairs", "single_and_pairs", "custom"];

#[derive(Parser, Debug)]
#[command(name = "numstab")]
#[command(about = "Precision and optimization instability studies with delta-debug fault localization")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Run configuration (TOML); defaults apply when omitted
	#[arg(long, short = 'c', global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(long, short = 'v', global = true)]
	pub verbose: bool,

	/// Maximum number of cells processed concurrently
	#[arg(long, short = 'j', global = true, value_name = "N")]
	pub jobs: Option<usize>,

	/// Keep cells already recorded in an existing output manifest
	#[arg(long, global = true)]
	pub resume: bool,

	#[command(subcommand)]
	pub command: Command,
}

/// Variable selection shared by `configure` and `run`.
#[derive(Args, Debug, Clone)]
pub struct Selection {
	/// Selection mode
	#[arg(long, default_value = "all", value_parser = clap::builder::PossibleValuesParser::new(MODES))]
	pub mode: String,

	/// Variable promoted in `single` mode
	#[arg(long, value_name = "NAME")]
	pub variable: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Catalog the floating-point variables of a C source file
	Analyze {
		#[arg(long, value_name = "PATH")]
		source: PathBuf,
		/// Restrict the catalog to one function
		#[arg(long, value_name = "NAME")]
		function: Option<String>,
		#[arg(long, default_value = "catalog.json", value_name = "PATH")]
		output: PathBuf,
	},
	/// Generate the configuration space from a catalog
	Configure {
		#[arg(long, value_name = "PATH")]
		catalog: PathBuf,
		#[command(flatten)]
		selection: Selection,
		#[arg(long, default_value = "configurations.json", value_name = "PATH")]
		output: PathBuf,
	},
	/// Write one mutated source per configuration
	Variants {
		#[arg(long, value_name = "PATH")]
		configurations: PathBuf,
		#[arg(long, default_value = "variants", value_name = "DIR")]
		output_dir: PathBuf,
	},
	/// Compile every variant at every optimization level and fast-math setting
	Compile {
		/// Variant manifest
		#[arg(long, value_name = "PATH")]
		variants: PathBuf,
		#[arg(long, default_value = "binaries", value_name = "DIR")]
		output_dir: PathBuf,
	},
	/// Run every compiled cell under the exact-arithmetic backend
	Validate {
		/// Compilation manifest
		#[arg(long, value_name = "PATH")]
		compilation: PathBuf,
		#[arg(long, default_value = "validation.json", value_name = "PATH")]
		output: PathBuf,
	},
	/// Localize unstable source lines of every valid cell
	Localize {
		/// Validation manifest
		#[arg(long, value_name = "PATH")]
		validation: PathBuf,
		#[arg(long, default_value = "ddebug", value_name = "DIR")]
		output_dir: PathBuf,
	},
	/// Merge compilation, validation and localization results
	Aggregate {
		#[arg(long, value_name = "PATH")]
		compilation: PathBuf,
		#[arg(long, value_name = "PATH")]
		validation: PathBuf,
		/// Localization manifest
		#[arg(long, value_name = "PATH")]
		ddebug: PathBuf,
		#[arg(long, default_value = "aggregate.json", value_name = "PATH")]
		output: PathBuf,
	},
	/// Run every stage in sequence
	Run {
		#[arg(long, value_name = "PATH")]
		source: PathBuf,
		#[arg(long, value_name = "NAME")]
		function: Option<String>,
		#[command(flatten)]
		selection: Selection,
		#[arg(long, default_value = "results", value_name = "DIR")]
		output_dir: PathBuf,
	},
	/// Compare two run directories (invoked by generated compare scripts)
	#[command(hide = true)]
	Compare {
		#[arg(long)]
		threshold: f64,
		reference: PathBuf,
		current: PathBuf,
	},
}
