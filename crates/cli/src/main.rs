//! `numstab` binary: one subcommand per pipeline stage, the chained `run`
//! driver, and the hidden `compare` oracle used by generated compare scripts.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, Selection};
use numstab_pipeline::ddebug::oracle;
use numstab_pipeline::stages::{self, MANIFEST_FILE};
use numstab_pipeline::{Layout, RunConfig, SelectionMode, StageContext};
use numstab_worker::TaskClass;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	if let Command::Compare { threshold, reference, current } = &cli.command {
		return Ok(compare(*threshold, reference, current));
	}

	let mut config = RunConfig::load(cli.config.as_deref())?;
	if let Some(jobs) = cli.jobs {
		config.jobs = jobs;
	}
	if config.comparator.is_none() {
		config.comparator = std::env::current_exe().ok();
	}
	config.validate()?;

	let ctx = StageContext::new(Arc::new(config)).with_resume(cli.resume);
	watch_interrupts(&ctx);

	match cli.command {
		Command::Analyze { source, function, output } => {
			stages::analyze(&source, function.as_deref(), &output)?;
			println!("{}", output.display());
		}
		Command::Configure { catalog, selection, output } => {
			let mode = selection_mode(&selection, &ctx.config)?;
			stages::configure(&catalog, &mode, &ctx.config, &output)?;
			println!("{}", output.display());
		}
		Command::Variants { configurations, output_dir } => {
			stages::variants(&configurations, &output_dir).await?;
			println!("{}", output_dir.join(MANIFEST_FILE).display());
		}
		Command::Compile { variants, output_dir } => {
			stages::compile(&ctx, &variants, &output_dir).await?;
			println!("{}", output_dir.join(MANIFEST_FILE).display());
		}
		Command::Validate { compilation, output } => {
			stages::validate(&ctx, &compilation, &output).await?;
			println!("{}", output.display());
		}
		Command::Localize { validation, output_dir } => {
			stages::localize(&ctx, &validation, &output_dir).await?;
			println!("{}", output_dir.join(MANIFEST_FILE).display());
		}
		Command::Aggregate {
			compilation,
			validation,
			ddebug,
			output,
		} => {
			stages::aggregate(&compilation, &validation, &ddebug, &output)?;
			println!("{}", output.display());
		}
		Command::Run {
			source,
			function,
			selection,
			output_dir,
		} => {
			let mode = selection_mode(&selection, &ctx.config)?;
			let layout = Layout::new(output_dir);
			let manifest = stages::run(&ctx, &source, function.as_deref(), &mode, &layout).await?;
			info!(
				stable = manifest.stable,
				unstable = manifest.unstable,
				skipped = manifest.skipped_invalid_output,
				compilation_failed = manifest.compilation_failed,
				localization_failed = manifest.localization_failed,
				"Summary"
			);
			println!("{}", layout.aggregate().display());
		}
		Command::Compare { .. } => unreachable!("handled before configuration is loaded"),
	}

	Ok(ExitCode::SUCCESS)
}

fn selection_mode(selection: &Selection, config: &RunConfig) -> anyhow::Result<SelectionMode> {
	SelectionMode::parse(&selection.mode, selection.variable.as_deref(), &config.custom)
		.with_context(|| format!("invalid selection mode `{}`", selection.mode))
}

/// Exit status for the minimizer: success iff the two runs are equivalent.
fn compare(threshold: f64, reference: &Path, current: &Path) -> ExitCode {
	match oracle::evaluate(reference, current, threshold) {
		Ok(comparison) if comparison.is_stable() => {
			debug!(%comparison, threshold, "Runs equivalent");
			ExitCode::SUCCESS
		}
		Ok(comparison) => {
			debug!(%comparison, threshold, "Runs deviate");
			ExitCode::FAILURE
		}
		Err(err) => {
			warn!(error = %err, "Comparison failed");
			ExitCode::FAILURE
		}
	}
}

/// First Ctrl-C stops dispatching new cells, the second kills in-flight processes.
fn watch_interrupts(ctx: &StageContext) {
	let stop = ctx.stop.clone();
	let abort = ctx.abort.clone();
	drop(numstab_worker::spawn(TaskClass::Io, async move {
		if tokio::signal::ctrl_c().await.is_err() {
			return;
		}
		warn!("Interrupt received; finishing in-flight cells (press Ctrl-C again to kill them)");
		stop.cancel();
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("Second interrupt; killing in-flight processes");
			abort.cancel();
		}
	}));
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("numstab=debug,numstab_pipeline=debug,numstab_worker=debug,numstab_source=debug,info")
			} else {
				EnvFilter::new("info")
			}
		})
	};
	let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false);

	if let Some(log_dir) = std::env::var("NUMSTAB_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("numstab.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);
			tracing_subscriber::registry().with(filter()).with(stderr_layer).with(file_layer).init();
			tracing::debug!(path = %log_path.display(), "File logging initialized");
			return;
		}
	}

	tracing_subscriber::registry().with(filter()).with(stderr_layer).init();
}
