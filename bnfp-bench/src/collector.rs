//! Batch result collection
//!
//! For every instance and solver, the collector finds the run's logs through
//! the [`LogLayout`] conventions, parses them and fills a [`ResultTable`].
//! A missing log is an error: every configured pair is expected to have run.

use crate::config::{BenchConfig, LogLayout, OutputNames, UNKNOWN_FIXED_POINTS};
use crate::dataset::{BenchmarkSet, Dataset, DatasetError, Instance, SetFamily};
use crate::parser::{LogError, LogParser, SolverLogs};
use crate::result::{LogPolicy, SolveResult, Solver, SolveSummary};
use crate::table::{ResultRow, ResultTable, TableResult, atomic_replace};
use globset::GlobBuilder;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Error type for collection
#[derive(Error, Debug)]
pub enum CollectError {
    /// Log parsing failed
    #[error("{instance} / {solver}: {source}")]
    Log {
        /// Instance id
        instance: String,
        /// Solver
        solver: Solver,
        /// Underlying error
        source: LogError,
    },
    /// Log patterns failed to compile
    #[error("Parser setup failed: {0}")]
    Setup(#[source] LogError),
    /// Dataset error
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    /// Walk directory error
    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
    /// Invalid layout template
    #[error("Invalid log pattern: {0}")]
    Glob(#[from] globset::Error),
    /// No log matches the layout
    #[error("No {solver} log for instance {instance} (pattern {pattern})")]
    LogNotFound {
        /// Solver
        solver: Solver,
        /// Instance id
        instance: String,
        /// Glob that matched nothing
        pattern: String,
    },
    /// The solver's results are not log-based
    #[error("{0} results are not collected from logs")]
    NotLogBased(Solver),
}

/// Result type for collection
pub type CollectResult<T> = Result<T, CollectError>;

/// Finds the log files of a run
#[derive(Debug, Clone)]
pub struct LogLocator {
    root: PathBuf,
    layout: LogLayout,
}

impl LogLocator {
    /// Create a locator for a log root
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, layout: LogLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    /// Glob, relative to the log root, of a run's main log
    #[must_use]
    pub fn pattern(&self, solver: Solver, family: SetFamily, id: &str) -> String {
        let template = match family {
            SetFamily::Bbm if solver.nested_logs() => &self.layout.bbm_nested,
            SetFamily::Bbm => &self.layout.bbm,
            SetFamily::Fasp => &self.layout.fasp,
        };
        template
            .replace("{solver}", solver.log_dir())
            .replace("{id}", &globset::escape(id))
    }

    /// Glob of a run's first-stage log
    #[must_use]
    pub fn first_stage_pattern(&self, solver: Solver, family: SetFamily, id: &str) -> String {
        let pattern = self.pattern(solver, family, id);
        match pattern.strip_suffix(".log") {
            Some(stem) => format!("{}{}", stem, self.layout.first_stage_suffix),
            None => format!("{}{}", pattern, self.layout.first_stage_suffix),
        }
    }

    /// Lexicographically first file matching a glob
    ///
    /// First-stage logs never match a main-log search.
    pub fn find(&self, pattern: &str, first_stage: bool) -> CollectResult<Option<PathBuf>> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        let base = self.root.join(literal_prefix(pattern));
        if !base.is_dir() {
            return Ok(None);
        }

        let mut matches = Vec::new();
        for entry in WalkDir::new(&base) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let is_first_stage = path
                .to_string_lossy()
                .ends_with(&self.layout.first_stage_suffix);
            if is_first_stage == first_stage && matcher.is_match(relative) {
                matches.push(path.to_path_buf());
            }
        }

        matches.sort();
        Ok(matches.into_iter().next())
    }

    /// Locate the logs of one run
    pub fn locate(
        &self,
        solver: Solver,
        family: SetFamily,
        id: &str,
    ) -> CollectResult<SolverLogs> {
        let require = |pattern: String, first_stage: bool| {
            self.find(&pattern, first_stage)?
                .ok_or_else(|| CollectError::LogNotFound {
                    solver,
                    instance: id.to_string(),
                    pattern,
                })
        };

        match solver.policy() {
            LogPolicy::External => Err(CollectError::NotLogBased(solver)),
            LogPolicy::TwoStage(_) => {
                let first = require(self.first_stage_pattern(solver, family, id), true)?;
                let second = self.find(&self.pattern(solver, family, id), false)?;
                Ok(SolverLogs::TwoStage { first, second })
            }
            _ => Ok(SolverLogs::Single(require(
                self.pattern(solver, family, id),
                false,
            )?)),
        }
    }
}

/// Leading glob components without wildcards
fn literal_prefix(pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .take_while(|c| !c.contains(['*', '?', '[', '{']))
        .collect()
}

/// Parsed results of both log families
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// BBM results
    pub bbm: ResultTable,
    /// Random and Selected results
    pub fasp: ResultTable,
}

impl Collected {
    /// Table of one family
    #[must_use]
    pub fn family(&self, family: SetFamily) -> &ResultTable {
        match family {
            SetFamily::Bbm => &self.bbm,
            SetFamily::Fasp => &self.fasp,
        }
    }
}

impl Collected {
    /// Write the CPU and fixed-point tables and the JSON dump
    ///
    /// The Selected-only CPU table is cut from the fASP table.
    pub fn write(
        &self,
        results_dir: &Path,
        dataset: &Dataset,
        outputs: &OutputNames,
    ) -> TableResult<Vec<PathBuf>> {
        fs::create_dir_all(results_dir)?;
        let selected = dataset.ids(BenchmarkSet::Selected);
        let selected_table = self.fasp.filtered(|id| selected.contains(id));

        let tables = [
            (&outputs.bbm_cpu, self.bbm.to_cpu_csv()),
            (&outputs.bbm_fixed_points, self.bbm.to_fixed_point_csv()),
            (&outputs.fasp_cpu, self.fasp.to_cpu_csv()),
            (&outputs.fasp_fixed_points, self.fasp.to_fixed_point_csv()),
            (&outputs.selected_cpu, selected_table.to_cpu_csv()),
        ];

        let mut written = Vec::new();
        for (name, table) in tables {
            let path = results_dir.join(name);
            table.write_atomic(&path)?;
            written.push(path);
        }

        let mut all = self.bbm.clone();
        all.extend(&self.fasp);
        let json = results_dir.join(&outputs.results_json);
        atomic_replace(&json, |w| all.write_json(w))?;
        info!("Wrote {} ({} instances)", json.display(), all.len());
        written.push(json);

        Ok(written)
    }
}

/// Log collector for a benchmark project
pub struct Collector {
    solvers: Vec<Solver>,
    parser: LogParser,
    locator: LogLocator,
}

impl Collector {
    /// Create a collector reading logs under `<project_root>/<layout.root>`
    pub fn new(config: &BenchConfig, project_root: &Path) -> CollectResult<Self> {
        let parser = LogParser::new(config.limits).map_err(CollectError::Setup)?;
        Ok(Self {
            solvers: config.solvers.clone(),
            parser,
            locator: LogLocator::new(config.logs_dir(project_root), config.layout.clone()),
        })
    }

    /// Parse one run
    pub fn collect_one(&self, instance: &Instance, solver: Solver) -> CollectResult<SolveResult> {
        let logs = self
            .locator
            .locate(solver, instance.set.family(), &instance.id)?;
        self.parser
            .parse_logs(solver, &logs)
            .map_err(|source| CollectError::Log {
                instance: instance.id.clone(),
                solver,
                source,
            })
    }

    /// Parse every configured solver on the instances of one family
    pub fn collect_family(
        &self,
        dataset: &Dataset,
        family: SetFamily,
    ) -> CollectResult<ResultTable> {
        let mut table = ResultTable::new(self.solvers.clone());

        for instance in dataset.in_family(family) {
            debug!("Collecting {}", instance.id);
            for &solver in &self.solvers {
                let result = self.collect_one(instance, solver)?;
                table.insert(&instance.id, solver, result);
            }
        }

        for &solver in &self.solvers {
            let summary = SolveSummary::from_results(table.solver_results(solver));
            info!(
                "{:?} {}: {}/{} solved, {} timeouts, {} memouts, {} errors",
                family,
                solver,
                summary.solved,
                summary.total,
                summary.timeouts,
                summary.memouts,
                summary.errors
            );
        }

        Ok(table)
    }

    /// Parse both families
    pub fn collect_all(&self, dataset: &Dataset) -> CollectResult<Collected> {
        Ok(Collected {
            bbm: self.collect_family(dataset, SetFamily::Bbm)?,
            fasp: self.collect_family(dataset, SetFamily::Fasp)?,
        })
    }
}

/// Fixed-point count of the first solver in `priority` that found one
#[must_use]
pub fn pick_fixed_points(row: &ResultRow, priority: &[Solver]) -> Option<u128> {
    priority
        .iter()
        .find_map(|s| row.results.get(s).and_then(|r| r.num_fixed_points))
}

/// Ground-truth fixed-point count per instance
///
/// Instances without any count get [`UNKNOWN_FIXED_POINTS`], which puts them
/// in the highest band.
#[must_use]
pub fn fixed_point_counts<'a>(
    tables: impl IntoIterator<Item = &'a ResultTable>,
    priority: &[Solver],
) -> BTreeMap<String, u128> {
    tables
        .into_iter()
        .flat_map(ResultTable::rows)
        .map(|row| {
            let count = pick_fixed_points(row, priority).unwrap_or(UNKNOWN_FIXED_POINTS);
            (row.instance.clone(), count)
        })
        .collect()
}
