//! Subcommand execution

use bnfp_bench::{
    AggregateError, BenchConfig, CactusError, CollectError, Collector, ConvertError, ConvertMode,
    Dataset, DatasetError, ReconcileError, TableError, convert_path, merge_all, summarize_results,
    write_cactus_files,
};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::format::{Status, print_written, println_status};
use crate::{Args, Command};

/// Error type for subcommands
#[derive(Error, Debug)]
pub(crate) enum RunError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Cactus(#[from] CactusError),
}

/// Run the selected subcommand
pub(crate) fn run(args: &Args, config: &BenchConfig) -> Result<(), RunError> {
    match &args.command {
        Command::Convert { path, canonical } => {
            let mode = if *canonical {
                ConvertMode::Canonical
            } else {
                ConvertMode::Verbatim
            };
            run_convert(args, path, mode)
        }
        Command::Collect { root } => run_collect(args, config, root),
        Command::Merge { results_dir } => run_merge(args, config, results_dir),
        Command::Summarize { root } => run_summarize(args, config, root),
        Command::Cactus { root } => run_cactus(args, config, root),
    }
}

fn run_convert(args: &Args, path: &Path, mode: ConvertMode) -> Result<(), RunError> {
    let conversions = convert_path(path, mode)?;
    if conversions.is_empty() {
        println_status(args, Status::Warn, "No .bnet files found");
    }
    for c in &conversions {
        println_status(
            args,
            Status::Ok,
            &format!("Converted {} -> {}", c.input.display(), c.output.display()),
        );
    }
    Ok(())
}

fn discover(config: &BenchConfig, root: &Path) -> Result<Dataset, RunError> {
    let dataset = Dataset::discover(&config.dataset_dir(root), &config.dataset)?;
    info!("Discovered {} instances", dataset.len());
    Ok(dataset)
}

fn run_collect(args: &Args, config: &BenchConfig, root: &Path) -> Result<(), RunError> {
    let dataset = discover(config, root)?;
    let collector = Collector::new(config, root)?;
    let collected = collector.collect_all(&dataset)?;
    let written = collected.write(&config.results_dir(root), &dataset, &config.outputs)?;
    print_written(args, &written);
    Ok(())
}

fn run_merge(args: &Args, config: &BenchConfig, results_dir: &Path) -> Result<(), RunError> {
    for report in merge_all(results_dir, &config.merge)? {
        let status = if report.matched == 0 {
            Status::Warn
        } else {
            Status::Ok
        };
        println_status(
            args,
            status,
            &format!(
                "Updated {} ({} of {} rows matched)",
                report.table.display(),
                report.matched,
                report.rows
            ),
        );
    }
    Ok(())
}

fn run_summarize(args: &Args, config: &BenchConfig, root: &Path) -> Result<(), RunError> {
    let dataset = discover(config, root)?;
    let results_dir = config.results_dir(root);
    let summary = summarize_results(&results_dir, &dataset, config)?;
    let written = summary.write(&results_dir, &config.outputs)?;
    print_written(args, &written);
    Ok(())
}

fn run_cactus(args: &Args, config: &BenchConfig, root: &Path) -> Result<(), RunError> {
    let dataset = discover(config, root)?;
    let written = write_cactus_files(&config.results_dir(root), &dataset, config)?;
    print_written(args, &written);
    Ok(())
}
