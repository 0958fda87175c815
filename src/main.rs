//! bps - command-line entry point.

use anyhow::Context;
use bps::cli::Args;
use bps::output;
use bps::scanner::Scanner;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let settings = args.settings().context("failed to load settings")?;
    let config = args.scan_config(&settings)?;
    let format = args.output_format(&settings)?;
    let hosts = args.targets()?;

    let mut scanner = Scanner::new(config);
    if args.progress {
        scanner = scanner.with_progress(progress_bar());
    }

    let results = scanner.scan_blocking(hosts)?;

    for err in &results.resolution_errors {
        output::print_warning(err);
    }

    output::print_results(&results, format).context("failed to write results")?;
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
