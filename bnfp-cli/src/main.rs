//! bnfp - Command-line tool for Boolean-network fixed-point benchmarks

mod format;
mod processor;

use bnfp_bench::BenchConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use format::eprintln_colored;

/// Verbosity level
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    /// Errors only
    Quiet,
    /// Warnings and status lines
    Normal,
    /// Progress information
    Verbose,
    /// Debug output
    Debug,
    /// Trace output
    Trace,
}

impl Verbosity {
    fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// bnfp - Boolean-network fixed-point benchmark post-processing
#[derive(Parser, Debug, Clone)]
#[command(name = "bnfp")]
#[command(version)]
#[command(about = "Parse solver logs and summarize Boolean-network fixed-point benchmarks")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (YAML). Missing fields take their defaults.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, value_enum, default_value = "normal", global = true)]
    verbosity: Verbosity,

    /// Enable quiet mode (equivalent to --verbosity quiet)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Convert a .bnet model, or every .bnet model under a directory, to .bn
    Convert {
        /// Model file or directory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Rename variables to x1, x2, ...
        #[arg(long)]
        canonical: bool,
    },
    /// Parse solver logs into CPU and fixed-point tables
    Collect {
        /// Project root holding the logs and dataset directories
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },
    /// Merge separately produced results into the canonical tables
    Merge {
        /// Directory holding the tables and the foreign result files
        #[arg(value_name = "RESULTS_DIR")]
        results_dir: PathBuf,
    },
    /// Count solved instances per set and threshold band
    Summarize {
        /// Project root
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },
    /// Write cactus plot data
    Cactus {
        /// Project root
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },
}

fn main() {
    let args = Args::parse();

    let verbosity = if args.quiet {
        Verbosity::Quiet
    } else {
        args.verbosity
    };

    // Set up logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(verbosity.level())
        .with_writer(std::io::stderr)
        .with_ansi(!args.no_color)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln_colored(&args, &format!("Failed to set tracing subscriber: {}", e));
        std::process::exit(1);
    }

    let config = match &args.config {
        Some(path) => match BenchConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln_colored(&args, &format!("Error loading config: {}", e));
                std::process::exit(1);
            }
        },
        None => BenchConfig::default(),
    };

    if let Err(e) = processor::run(&args, &config) {
        eprintln_colored(&args, &format!("Error: {}", e));
        std::process::exit(1);
    }
}
