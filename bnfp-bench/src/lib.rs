//! bnfp-bench - Boolean-network fixed-point benchmark post-processing
//!
//! This crate turns the raw logs of Boolean-network fixed-point solvers into
//! result tables and summaries for reporting.
//!
//! # Features
//!
//! - `.bnet` to `.bn` model conversion with optional canonical renaming
//! - Per-solver log parsing with GNU `time -v` resource extraction
//! - Timeout / out-of-memory / error classification, including two-stage runs
//! - Convention-based log discovery and result collection
//! - Fuzzy instance-name reconciliation of separately produced results
//! - Solved-instance summaries per benchmark set and threshold band
//! - Cactus plot data
//!
//! # Examples
//!
//! ## Parsing a log
//!
//! ```
//! use bnfp_bench::{Limits, LogParser, Solver};
//!
//! let parser = LogParser::new(Limits::default()).expect("patterns compile");
//! let log = "Found 42 fixed points\n\
//!            \tUser time (seconds): 9.50\n\
//!            \tSystem time (seconds): 0.50\n\
//!            \tMaximum resident set size (kbytes): 1000\n";
//!
//! let result = parser.parse_text(Solver::Aeon, log).expect("well-formed log");
//! assert_eq!(result.num_fixed_points, Some(42));
//! assert_eq!(result.cpu_seconds, Some(10.0));
//! assert!(result.abort_kind.is_none());
//! ```
//!
//! ## Collecting a benchmark
//!
//! ```no_run
//! use bnfp_bench::{BenchConfig, Collector, Dataset};
//! use std::path::Path;
//!
//! let root = Path::new("/path/to/project");
//! let config = BenchConfig::default();
//! let dataset = Dataset::discover(&config.dataset_dir(root), &config.dataset)
//!     .expect("Failed to discover instances");
//!
//! let collector = Collector::new(&config, root).expect("Failed to set up parser");
//! let collected = collector.collect_all(&dataset).expect("Failed to collect logs");
//! collected
//!     .bbm
//!     .to_cpu_csv()
//!     .write_atomic(config.results_dir(root).join("cpu.csv"))
//!     .expect("Failed to write table");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Core modules
pub mod config;
pub mod parser;
pub mod result;

// Tables and collection
pub mod collector;
pub mod dataset;
pub mod table;

// Post-processing
pub mod aggregate;
pub mod cactus;
pub mod convert;
pub mod reconcile;

// Re-export main types for convenience
pub use aggregate::{
    AggregateError, AggregateResult, Aggregator, Summary, ThresholdBands, load_fixed_point_truth,
    summarize_results,
};
pub use cactus::{CactusError, CactusPoint, CactusResult, cactus_points, write_cactus_files};
pub use collector::{
    CollectError, CollectResult, Collected, Collector, LogLocator, fixed_point_counts,
};
pub use config::{BenchConfig, ConfigError, ConfigResult, Limits, Thresholds};
pub use convert::{ConvertError, ConvertMode, ConvertResult, Conversion, convert_path};
pub use dataset::{BenchmarkSet, Dataset, DatasetError, Instance, SetFamily};
pub use parser::{LogError, LogParser, LogResult, SolverLogs};
pub use reconcile::{MergeReport, ReconcileError, ReconcileResult, match_instance, merge_all};
pub use result::{AbortKind, SolveResult, SolveSummary, Solver, is_solved_cell};
pub use table::{CsvTable, ResultTable, TableError, TableKind, TableResult};
