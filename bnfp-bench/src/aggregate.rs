//! Solved-instance summaries
//!
//! Instances are bucketed by fixed-point count and by variable count into
//! [`ThresholdBands`], and every solver's solved runs are counted per
//! benchmark set and per band.

use crate::config::{BenchConfig, OutputNames, Thresholds, UNKNOWN_FIXED_POINTS};
use crate::dataset::{BenchmarkSet, Dataset, Instance};
use crate::result::is_solved_cell;
use crate::table::{CsvTable, TableError, TableRow};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for aggregation
#[derive(Error, Debug)]
pub enum AggregateError {
    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] TableError),
    /// A band list has no bounds
    #[error("No {0} thresholds configured")]
    EmptyBands(&'static str),
    /// A fixed-point cell is not a count
    #[error("Invalid fixed-point count {value:?} for instance {instance}")]
    InvalidCount {
        /// Instance id
        instance: String,
        /// Cell text
        value: String,
    },
}

/// Result type for aggregation
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Ordered lower bounds
///
/// A value belongs to the band of the largest bound it meets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdBands {
    bounds: Vec<u128>,
}

impl ThresholdBands {
    /// Create bands from lower bounds in any order
    pub fn new(bounds: &[u64], metric: &'static str) -> AggregateResult<Self> {
        if bounds.is_empty() {
            return Err(AggregateError::EmptyBands(metric));
        }
        let mut bounds: Vec<u128> = bounds.iter().map(|&b| u128::from(b)).collect();
        bounds.sort_unstable();
        bounds.dedup();
        Ok(Self { bounds })
    }

    /// Number of bands
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether there are no bands
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Index, in ascending bound order, of the band holding `value`
    #[must_use]
    pub fn band_of(&self, value: u128) -> Option<usize> {
        self.bounds.iter().rposition(|&lb| value >= lb)
    }

    /// Row labels, ascending
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.bounds.iter().map(|lb| format!("{}<=", lb)).collect()
    }
}

/// Counts over one metric's bands, summed across sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandSummary {
    /// Band labels, ascending
    pub labels: Vec<String>,
    /// Instances per band
    pub totals: Vec<usize>,
    /// Solved instances per solver, per band
    pub solved: Vec<Vec<usize>>,
}

impl BandSummary {
    fn new(bands: &ThresholdBands, solvers: usize) -> Self {
        Self {
            labels: bands.labels(),
            totals: vec![0; bands.len()],
            solved: vec![vec![0; bands.len()]; solvers],
        }
    }

    fn add(&mut self, band: Option<usize>, solved: &[bool]) {
        let Some(band) = band else {
            return;
        };
        self.totals[band] += 1;
        for (per_band, _) in self.solved.iter_mut().zip(solved).filter(|(_, s)| **s) {
            per_band[band] += 1;
        }
    }

    fn to_table(&self, solvers: &[String]) -> CsvTable {
        let mut table = CsvTable::with_key("Range", count_columns(solvers));
        for (band, label) in self.labels.iter().enumerate() {
            let cells = std::iter::once(self.totals[band].to_string())
                .chain(self.solved.iter().map(|per_band| per_band[band].to_string()));
            table.push_row(label.as_str(), cells);
        }
        table
    }
}

/// Counts of one benchmark set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetSummary {
    /// The set
    pub set: BenchmarkSet,
    /// Instances of the set
    pub total: usize,
    /// Solved instances per solver
    pub solved: Vec<usize>,
}

/// All summary counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Solver columns
    pub solvers: Vec<String>,
    /// Per-set counts
    pub sets: Vec<SetSummary>,
    /// Fixed-point bands
    pub fixed_points: BandSummary,
    /// Variable-count bands
    pub num_vars: BandSummary,
}

impl Summary {
    /// `Set,#Instance,<solvers>`
    #[must_use]
    pub fn per_set_table(&self) -> CsvTable {
        let mut table = CsvTable::with_key("Set", count_columns(&self.solvers));
        for set in &self.sets {
            let cells = std::iter::once(set.total.to_string())
                .chain(set.solved.iter().map(ToString::to_string));
            table.push_row(set.set.name(), cells);
        }
        table
    }

    /// `Range,#Instance,<solvers>` over fixed-point bands
    #[must_use]
    pub fn fixed_point_table(&self) -> CsvTable {
        self.fixed_points.to_table(&self.solvers)
    }

    /// `Range,#Instance,<solvers>` over variable-count bands
    #[must_use]
    pub fn num_vars_table(&self) -> CsvTable {
        self.num_vars.to_table(&self.solvers)
    }

    /// Write the three summary tables into a results directory
    pub fn write(&self, results_dir: &Path, outputs: &OutputNames) -> AggregateResult<Vec<PathBuf>> {
        let files = [
            (&outputs.solved_per_set, self.per_set_table()),
            (&outputs.solved_per_fps_range, self.fixed_point_table()),
            (&outputs.solved_per_vars_range, self.num_vars_table()),
        ];
        let mut written = Vec::new();
        for (name, table) in files {
            let path = results_dir.join(name);
            table.write_atomic(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// CPU rows of several tables keyed by instance; later tables win
pub struct CpuIndex<'a> {
    solvers: Vec<String>,
    rows: HashMap<&'a str, TableRow<'a>>,
}

impl<'a> CpuIndex<'a> {
    /// Index CPU tables, taking solver columns from the first
    #[must_use]
    pub fn new(tables: &'a [CsvTable]) -> Self {
        let solvers = tables
            .first()
            .map(|t| t.solver_columns().to_vec())
            .unwrap_or_default();
        let rows = tables
            .iter()
            .flat_map(CsvTable::rows)
            .map(|r| (r.instance(), r))
            .collect();
        Self { solvers, rows }
    }

    /// Solver columns
    #[must_use]
    pub fn solvers(&self) -> &[String] {
        &self.solvers
    }

    /// Which solvers solved an instance; instances without a row solved nothing
    #[must_use]
    pub fn solved(&self, instance: &str) -> Vec<bool> {
        let row = self.rows.get(instance);
        self.solvers
            .iter()
            .map(|s| row.and_then(|r| r.get(s)).is_some_and(is_solved_cell))
            .collect()
    }
}

/// Band-based aggregator
#[derive(Debug, Clone)]
pub struct Aggregator {
    fixed_points: ThresholdBands,
    num_vars: ThresholdBands,
}

impl Aggregator {
    /// Create an aggregator from configured thresholds
    pub fn new(thresholds: &Thresholds) -> AggregateResult<Self> {
        Ok(Self {
            fixed_points: ThresholdBands::new(&thresholds.fixed_points, "fixed-point")?,
            num_vars: ThresholdBands::new(&thresholds.num_vars, "variable")?,
        })
    }

    /// Count solved instances per set and per band
    ///
    /// Instances missing from `fixed_points` count as having
    /// [`UNKNOWN_FIXED_POINTS`].
    #[must_use]
    pub fn summarize(
        &self,
        dataset: &Dataset,
        fixed_points: &BTreeMap<String, u128>,
        cpu: &CpuIndex<'_>,
    ) -> Summary {
        let solvers = cpu.solvers().to_vec();
        let mut fp_summary = BandSummary::new(&self.fixed_points, solvers.len());
        let mut var_summary = BandSummary::new(&self.num_vars, solvers.len());
        let mut sets = Vec::new();

        for set in BenchmarkSet::ALL {
            let mut set_summary = SetSummary {
                set,
                total: 0,
                solved: vec![0; solvers.len()],
            };

            for instance in dataset.in_set(set) {
                let fp = fixed_points
                    .get(&instance.id)
                    .copied()
                    .unwrap_or(UNKNOWN_FIXED_POINTS);
                let fp_band = band(&self.fixed_points, instance, fp, "fixed-point");
                let var_band =
                    band(&self.num_vars, instance, instance.num_vars as u128, "variable");
                let solved = cpu.solved(&instance.id);

                set_summary.total += 1;
                fp_summary.add(fp_band, &solved);
                var_summary.add(var_band, &solved);
                for (count, _) in set_summary
                    .solved
                    .iter_mut()
                    .zip(&solved)
                    .filter(|(_, s)| **s)
                {
                    *count += 1;
                }
            }

            debug!("{}: {} instances, solved {:?}", set, set_summary.total, set_summary.solved);
            sets.push(set_summary);
        }

        Summary {
            solvers,
            sets,
            fixed_points: fp_summary,
            num_vars: var_summary,
        }
    }
}

fn count_columns(solvers: &[String]) -> Vec<String> {
    let mut columns = vec!["#Instance".to_string()];
    columns.extend(solvers.iter().cloned());
    columns
}

fn band(bands: &ThresholdBands, instance: &Instance, value: u128, metric: &str) -> Option<usize> {
    let band = bands.band_of(value);
    if band.is_none() {
        warn!("{} {} count {} is below every threshold", instance.id, metric, value);
    }
    band
}

/// Ground-truth fixed-point counts from fixed-point tables
///
/// Each row contributes its first non-empty cell with any `*` suffix
/// removed; later tables override earlier ones. Ids of `all_ids` without a
/// count get [`UNKNOWN_FIXED_POINTS`].
pub fn load_fixed_point_truth<'a>(
    tables: &[CsvTable],
    all_ids: impl IntoIterator<Item = &'a str>,
) -> AggregateResult<BTreeMap<String, u128>> {
    let mut counts = BTreeMap::new();

    for table in tables {
        for row in table.rows() {
            let Some((_, cell)) = row.solver_cells().find(|(_, c)| !c.is_empty()) else {
                continue;
            };
            let count = cell
                .trim_end_matches('*')
                .trim()
                .parse::<u128>()
                .map_err(|_| AggregateError::InvalidCount {
                    instance: row.instance().to_string(),
                    value: cell.to_string(),
                })?;
            counts.insert(row.instance().to_string(), count);
        }
    }

    for id in all_ids {
        counts.entry(id.to_string()).or_insert(UNKNOWN_FIXED_POINTS);
    }
    Ok(counts)
}

/// Read the result tables of a results directory and count solved runs
pub fn summarize_results(
    results_dir: &Path,
    dataset: &Dataset,
    config: &BenchConfig,
) -> AggregateResult<Summary> {
    let outputs = &config.outputs;
    let read = |name: &String| CsvTable::read(results_dir.join(name));

    let fp_tables = [read(&outputs.bbm_fixed_points)?, read(&outputs.fasp_fixed_points)?];
    let cpu_tables = [
        read(&outputs.bbm_cpu)?,
        read(&outputs.fasp_cpu)?,
        read(&outputs.selected_cpu)?,
    ];

    let fixed_points =
        load_fixed_point_truth(&fp_tables, dataset.instances().iter().map(|i| i.id.as_str()))?;
    let cpu = CpuIndex::new(&cpu_tables);
    Ok(Aggregator::new(&config.thresholds)?.summarize(dataset, &fixed_points, &cpu))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, set: BenchmarkSet, num_vars: usize) -> Instance {
        Instance {
            id: id.to_string(),
            set,
            model_path: PathBuf::from(format!("{}.bnet", id)),
            num_vars,
        }
    }

    fn table(text: &str) -> CsvTable {
        CsvTable::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_band_of() {
        let bands = ThresholdBands::new(&[2000, 1000, 100, 0], "variable").unwrap();
        assert_eq!(bands.labels(), ["0<=", "100<=", "1000<=", "2000<="]);
        assert_eq!(bands.labels()[bands.band_of(1500).unwrap()], "1000<=");
        assert_eq!(bands.labels()[bands.band_of(50).unwrap()], "0<=");
        assert_eq!(bands.labels()[bands.band_of(2000).unwrap()], "2000<=");
    }

    #[test]
    fn test_band_below_all_bounds() {
        let bands = ThresholdBands::new(&[10, 5], "variable").unwrap();
        assert_eq!(bands.band_of(4), None);
        assert!(ThresholdBands::new(&[], "variable").is_err());
    }

    #[test]
    fn test_sentinel_falls_in_top_band() {
        let bands = ThresholdBands::new(&Thresholds::default().fixed_points, "fixed-point").unwrap();
        assert_eq!(bands.band_of(UNKNOWN_FIXED_POINTS), Some(2));
    }

    #[test]
    fn test_load_fixed_point_truth() {
        let bbm = table("Instance,A,B\n001,,4\n002,,\n");
        let fasp = table("Instance,A,PFVS\nr1,12*,\n");
        let truth = load_fixed_point_truth(&[bbm, fasp], ["001", "002", "r1", "s1"]).unwrap();
        assert_eq!(truth["001"], 4);
        assert_eq!(truth["r1"], 12);
        assert_eq!(truth["002"], UNKNOWN_FIXED_POINTS);
        assert_eq!(truth["s1"], UNKNOWN_FIXED_POINTS);
    }

    #[test]
    fn test_load_fixed_point_truth_rejects_garbage() {
        let bad = table("Instance,A\n001,many\n");
        let err = load_fixed_point_truth(&[bad], []).unwrap_err();
        assert!(matches!(err, AggregateError::InvalidCount { .. }));
    }

    #[test]
    fn test_summarize() {
        let dataset = Dataset::from_instances(vec![
            instance("001", BenchmarkSet::Bbm, 50),
            instance("002", BenchmarkSet::Bbm, 1500),
            instance("r1", BenchmarkSet::Random, 2500),
        ])
        .unwrap();
        let cpu_tables = [
            table("Instance,A,B\n001,1.00,TIMEOUT\n002,ERROR,2.50\n"),
            table("Instance,A,B\nr1,-,\n"),
        ];
        let cpu = CpuIndex::new(&cpu_tables);
        let mut fps = BTreeMap::new();
        fps.insert("001".to_string(), 3);
        fps.insert("002".to_string(), 5000);

        let aggregator = Aggregator::new(&Thresholds::default()).unwrap();
        let summary = aggregator.summarize(&dataset, &fps, &cpu);

        let per_set = summary.per_set_table();
        assert_eq!(per_set.header(), ["Set", "#Instance", "A", "B"]);
        let bbm = per_set.row("BBM").unwrap();
        assert_eq!(bbm.get("#Instance"), Some("2"));
        assert_eq!(bbm.get("A"), Some("1"));
        assert_eq!(bbm.get("B"), Some("1"));
        assert_eq!(per_set.row("Random").unwrap().get("A"), Some("0"));
        assert_eq!(per_set.row("Selected").unwrap().get("#Instance"), Some("0"));

        let fp_table = summary.fixed_point_table();
        assert_eq!(fp_table.instances().collect::<Vec<_>>(), ["0<=", "1000<=", "10000000000<="]);
        assert_eq!(fp_table.row("0<=").unwrap().get("A"), Some("1"));
        assert_eq!(fp_table.row("1000<=").unwrap().get("B"), Some("1"));
        assert_eq!(fp_table.row("10000000000<=").unwrap().get("#Instance"), Some("1"));

        let vars = summary.num_vars_table();
        assert_eq!(vars.row("1000<=").unwrap().get("B"), Some("1"));
        assert_eq!(vars.row("2000<=").unwrap().get("#Instance"), Some("1"));
        assert_eq!(vars.row("100<=").unwrap().get("#Instance"), Some("0"));
    }
}
