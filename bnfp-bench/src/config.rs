//! Benchmark configuration
//!
//! Every constant the pipeline depends on (time budget, memory ceiling,
//! threshold bands, directory conventions, merge map) lives here and is
//! passed explicitly into the parsing, collecting and aggregating code.

use crate::dataset::BenchmarkSet;
use crate::result::Solver;
use crate::table::TableKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed-point count assigned to instances no solver could count
pub const UNKNOWN_FIXED_POINTS: u128 = 1_000_000_000_000_000_000_000_000_000_000;

/// Error type for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// YAML error
    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Resource limits the external measurement wrapper enforced
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// CPU time budget per run in seconds
    pub time_budget_secs: f64,
    /// Runs this close to the budget without a result count as timeouts
    pub timeout_margin_secs: f64,
    /// Peak resident memory above which a failed run is an out-of-memory
    pub memory_ceiling_kb: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            time_budget_secs: 1800.0,
            timeout_margin_secs: 3.0,
            memory_ceiling_kb: 60_000_000,
        }
    }
}

impl Limits {
    /// CPU time at or above which an unfinished run is a timeout
    #[must_use]
    pub fn timeout_threshold(&self) -> f64 {
        self.time_budget_secs - self.timeout_margin_secs
    }

    /// Set the time budget
    #[must_use]
    pub fn with_time_budget(mut self, secs: f64) -> Self {
        self.time_budget_secs = secs;
        self
    }

    /// Set the timeout margin
    #[must_use]
    pub fn with_timeout_margin(mut self, secs: f64) -> Self {
        self.timeout_margin_secs = secs;
        self
    }

    /// Set the memory ceiling
    #[must_use]
    pub fn with_memory_ceiling(mut self, kb: u64) -> Self {
        self.memory_ceiling_kb = kb;
        self
    }
}

/// Lower bounds of the summary bands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Bands over the number of fixed points
    pub fixed_points: Vec<u64>,
    /// Bands over the number of variables
    pub num_vars: Vec<u64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fixed_points: vec![10_000_000_000, 1000, 0],
            num_vars: vec![2000, 1000, 100, 0],
        }
    }
}

/// Where solver logs live, relative to the log root
///
/// Templates use `{solver}` for the solver's log directory and `{id}` for the
/// instance id; the remaining text is a glob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogLayout {
    /// Log root, relative to the project root
    pub root: PathBuf,
    /// BBM logs
    pub bbm: String,
    /// BBM logs of solvers that keep one directory per run
    pub bbm_nested: String,
    /// Logs of the fASP sets (Random, Selected)
    pub fasp: String,
    /// Replaces the trailing `.log` of a template to find first-stage logs
    pub first_stage_suffix: String,
}

impl Default for LogLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("logs"),
            bbm: "{solver}/bbm/*{id}*.log".to_string(),
            bbm_nested: "{solver}/bbm/*id-{id}*/*.log".to_string(),
            fasp: "{solver}/fasp/**/{id}.bnet.log".to_string(),
            first_stage_suffix: ".stage1.log".to_string(),
        }
    }
}

/// Naming convention of one benchmark set's model files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLayout {
    /// The set
    pub set: BenchmarkSet,
    /// Directory under the dataset root
    pub dir: String,
    /// File name glob
    pub pattern: String,
    /// Prefix stripped from the file stem to obtain the instance id
    #[serde(default)]
    pub id_prefix: String,
}

/// Where model files live, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    /// Dataset root
    pub root: PathBuf,
    /// One entry per benchmark set
    pub sets: Vec<SetLayout>,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            sets: vec![
                SetLayout {
                    set: BenchmarkSet::Bbm,
                    dir: "BBM".to_string(),
                    pattern: "model_*.bnet".to_string(),
                    id_prefix: "model_".to_string(),
                },
                SetLayout {
                    set: BenchmarkSet::Random,
                    dir: "Random".to_string(),
                    pattern: "*.bnet".to_string(),
                    id_prefix: String::new(),
                },
                SetLayout {
                    set: BenchmarkSet::Selected,
                    dir: "Selected".to_string(),
                    pattern: "*.bnet".to_string(),
                    id_prefix: String::new(),
                },
            ],
        }
    }
}

/// One canonical table and the foreign result files merged into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeTarget {
    /// Canonical table file name
    pub table: String,
    /// What the table holds
    pub kind: TableKind,
    /// Foreign result file names, in merge order
    pub sources: Vec<String>,
}

impl MergeTarget {
    fn new(table: &str, kind: TableKind, sources: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            kind,
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Merge of separately produced results into the canonical tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Column written into the canonical tables
    pub column: String,
    /// Tables to update
    pub targets: Vec<MergeTarget>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        let bbm = ["pfvs_bbm_results.csv"];
        let fasp = ["pfvs_random_results.csv", "pfvs_selected_results.csv"];
        Self {
            column: Solver::Pfvs.column_name().to_string(),
            targets: vec![
                MergeTarget::new("cpu.csv", TableKind::Cpu, &bbm),
                MergeTarget::new("fixed_points.csv", TableKind::FixedPoints, &bbm),
                MergeTarget::new("cpu_fasp.csv", TableKind::Cpu, &fasp),
                MergeTarget::new("fixed_points_fasp.csv", TableKind::FixedPoints, &fasp),
                MergeTarget::new("cpu_selected.csv", TableKind::Cpu, &["pfvs_selected_results.csv"]),
            ],
        }
    }
}

/// Output file names, relative to the results directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNames {
    /// Results directory, relative to the project root
    pub results_dir: PathBuf,
    /// BBM CPU table
    pub bbm_cpu: String,
    /// BBM fixed-point table
    pub bbm_fixed_points: String,
    /// Random + Selected CPU table
    pub fasp_cpu: String,
    /// Random + Selected fixed-point table
    pub fasp_fixed_points: String,
    /// Selected-only CPU table
    pub selected_cpu: String,
    /// JSON dump of every parsed result
    pub results_json: String,
    /// Solved instances per benchmark set
    pub solved_per_set: String,
    /// Solved instances per fixed-point band
    pub solved_per_fps_range: String,
    /// Solved instances per variable-count band
    pub solved_per_vars_range: String,
    /// BBM cactus data
    pub cactus_bbm: String,
    /// Random + Selected cactus data
    pub cactus_fasp: String,
    /// Random-only cactus data
    pub cactus_random: String,
    /// Selected-only cactus data
    pub cactus_selected: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            bbm_cpu: "cpu.csv".to_string(),
            bbm_fixed_points: "fixed_points.csv".to_string(),
            fasp_cpu: "cpu_fasp.csv".to_string(),
            fasp_fixed_points: "fixed_points_fasp.csv".to_string(),
            selected_cpu: "cpu_selected.csv".to_string(),
            results_json: "results.json".to_string(),
            solved_per_set: "solved_per_set.csv".to_string(),
            solved_per_fps_range: "solved_per_fps_range.csv".to_string(),
            solved_per_vars_range: "solved_per_vars_range.csv".to_string(),
            cactus_bbm: "time_for_cactus.dat".to_string(),
            cactus_fasp: "time_fasp_for_cactus.dat".to_string(),
            cactus_random: "time_pseudo_random_for_cactus.dat".to_string(),
            cactus_selected: "time_selected_for_cactus.dat".to_string(),
        }
    }
}

/// Complete configuration of a benchmark post-processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Resource limits
    pub limits: Limits,
    /// Summary bands
    pub thresholds: Thresholds,
    /// Solvers whose logs are collected
    pub solvers: Vec<Solver>,
    /// Ground-truth preference when picking a fixed-point count
    pub fixed_point_priority: Vec<Solver>,
    /// Log layout
    pub layout: LogLayout,
    /// Dataset layout
    pub dataset: DatasetLayout,
    /// Merge map
    pub merge: MergeConfig,
    /// Output names
    pub outputs: OutputNames,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            thresholds: Thresholds::default(),
            solvers: vec![Solver::FaspConj, Solver::FaspSrc, Solver::HybridBmsa],
            fixed_point_priority: vec![Solver::HybridBmsa, Solver::FaspSrc, Solver::FaspConj],
            layout: LogLayout::default(),
            dataset: DatasetLayout::default(),
            merge: MergeConfig::default(),
            outputs: OutputNames::default(),
        }
    }
}

impl BenchConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a YAML configuration file; missing fields take defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML configuration
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        if self.limits.time_budget_secs <= 0.0 {
            return Err(ConfigError::Invalid("time budget must be positive".to_string()));
        }
        if self.limits.timeout_margin_secs < 0.0
            || self.limits.timeout_margin_secs > self.limits.time_budget_secs
        {
            return Err(ConfigError::Invalid(
                "timeout margin must lie between zero and the time budget".to_string(),
            ));
        }
        if self.thresholds.fixed_points.is_empty() || self.thresholds.num_vars.is_empty() {
            return Err(ConfigError::Invalid("threshold lists must not be empty".to_string()));
        }
        if let Some(solver) = self
            .solvers
            .iter()
            .find(|s| matches!(s.policy(), crate::result::LogPolicy::External))
        {
            return Err(ConfigError::Invalid(format!(
                "{} has no logs to collect; merge its results instead",
                solver
            )));
        }
        Ok(())
    }

    /// Set the resource limits
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the summary bands
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the solvers whose logs are collected
    #[must_use]
    pub fn with_solvers(mut self, solvers: Vec<Solver>) -> Self {
        self.solvers = solvers;
        self
    }

    /// Log root under a project root
    #[must_use]
    pub fn logs_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.layout.root)
    }

    /// Dataset root under a project root
    #[must_use]
    pub fn dataset_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.dataset.root)
    }

    /// Results directory under a project root
    #[must_use]
    pub fn results_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.outputs.results_dir)
    }
}
