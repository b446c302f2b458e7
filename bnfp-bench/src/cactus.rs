//! Cactus plot data
//!
//! The plotting scripts read `<solver>,<seconds>` lines, one per solved run.

use crate::config::BenchConfig;
use crate::dataset::{BenchmarkSet, Dataset};
use crate::result::{Solver, is_solved_cell};
use crate::table::{CsvTable, TableError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Error type for cactus data
#[derive(Error, Debug)]
pub enum CactusError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] TableError),
    /// A solved cell is not a time
    #[error("Invalid time {value:?} for {solver} on {instance}")]
    InvalidTime {
        /// Instance id
        instance: String,
        /// Solver column
        solver: String,
        /// Cell text
        value: String,
    },
}

/// Result type for cactus data
pub type CactusResult<T> = Result<T, CactusError>;

/// Cactus plot data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CactusPoint {
    /// Number of instances solved
    pub solved: usize,
    /// Time at which this many were solved
    pub time: f64,
}

/// Solved times of the known solver columns, restricted to some instances
pub fn solved_times(
    cpu: &CsvTable,
    instances: &HashSet<&str>,
) -> CactusResult<Vec<(String, f64)>> {
    let mut times = Vec::new();
    for row in cpu.rows().filter(|r| instances.contains(r.instance())) {
        for (column, cell) in row.solver_cells() {
            if Solver::from_column_name(column).is_none() || !is_solved_cell(cell) {
                continue;
            }
            let time = cell.trim().parse::<f64>().map_err(|_| CactusError::InvalidTime {
                instance: row.instance().to_string(),
                solver: column.to_string(),
                value: cell.to_string(),
            })?;
            times.push((column.to_string(), time));
        }
    }
    Ok(times)
}

/// Write `<solver>,<seconds>` lines
pub fn write_cactus_dat<W: Write>(
    mut writer: W,
    cpu: &CsvTable,
    instances: &HashSet<&str>,
) -> CactusResult<usize> {
    let times = solved_times(cpu, instances)?;
    for (solver, time) in &times {
        writeln!(writer, "{},{:?}", solver, time)?;
    }
    writer.flush()?;
    Ok(times.len())
}

/// Per-solver sorted solve times with cumulative solved counts
pub fn cactus_points(
    cpu: &CsvTable,
    instances: &HashSet<&str>,
) -> CactusResult<BTreeMap<String, Vec<CactusPoint>>> {
    let mut per_solver: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (solver, time) in solved_times(cpu, instances)? {
        per_solver.entry(solver).or_default().push(time);
    }

    Ok(per_solver
        .into_iter()
        .map(|(solver, mut times)| {
            times.sort_by(f64::total_cmp);
            let points = times
                .into_iter()
                .enumerate()
                .map(|(i, time)| CactusPoint {
                    solved: i + 1,
                    time,
                })
                .collect();
            (solver, points)
        })
        .collect())
}

/// Write the four cactus files of a results directory
pub fn write_cactus_files(
    results_dir: &Path,
    dataset: &Dataset,
    config: &BenchConfig,
) -> CactusResult<Vec<PathBuf>> {
    let outputs = &config.outputs;
    let bbm_cpu = CsvTable::read(results_dir.join(&outputs.bbm_cpu))?;
    let fasp_cpu = CsvTable::read(results_dir.join(&outputs.fasp_cpu))?;

    let random = dataset.ids(BenchmarkSet::Random);
    let selected = dataset.ids(BenchmarkSet::Selected);
    let fasp: HashSet<&str> = random.union(&selected).copied().collect();

    let files = [
        (&outputs.cactus_bbm, &bbm_cpu, dataset.ids(BenchmarkSet::Bbm)),
        (&outputs.cactus_fasp, &fasp_cpu, fasp),
        (&outputs.cactus_random, &fasp_cpu, random),
        (&outputs.cactus_selected, &fasp_cpu, selected),
    ];

    let mut written = Vec::new();
    for (name, cpu, ids) in &files {
        let path = results_dir.join(name);
        let lines = write_cactus_dat(BufWriter::new(File::create(&path)?), cpu, ids)?;
        info!("Wrote {} ({} solved runs)", path.display(), lines);
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu() -> CsvTable {
        let text = "Instance,fASP_conj,Hybrid_BMSA,Other\n\
                    a,1.50,TIMEOUT,2.00\n\
                    b,12.00,0.25,1.00\n\
                    c,-,ERROR,\n";
        CsvTable::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_write_cactus_dat() {
        let ids: HashSet<&str> = ["a", "c"].into_iter().collect();
        let mut buf = Vec::new();
        let lines = write_cactus_dat(&mut buf, &cpu(), &ids).unwrap();
        assert_eq!(lines, 1);
        assert_eq!(String::from_utf8(buf).unwrap(), "fASP_conj,1.5\n");
    }

    #[test]
    fn test_whole_seconds_keep_decimal() {
        let ids: HashSet<&str> = ["b"].into_iter().collect();
        let mut buf = Vec::new();
        write_cactus_dat(&mut buf, &cpu(), &ids).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "fASP_conj,12.0\nHybrid_BMSA,0.25\n"
        );
    }

    #[test]
    fn test_cactus_points() {
        let ids: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
        let points = cactus_points(&cpu(), &ids).unwrap();
        let fasp = &points["fASP_conj"];
        assert_eq!(fasp.len(), 2);
        assert_eq!(fasp[0], CactusPoint { solved: 1, time: 1.5 });
        assert_eq!(fasp[1], CactusPoint { solved: 2, time: 12.0 });
        assert_eq!(points["Hybrid_BMSA"].len(), 1);
        assert!(!points.contains_key("Other"));
    }

    #[test]
    fn test_invalid_time() {
        let table = CsvTable::from_reader("Instance,PFVS\na,fast\n".as_bytes()).unwrap();
        let ids: HashSet<&str> = ["a"].into_iter().collect();
        assert!(matches!(
            solved_times(&table, &ids),
            Err(CactusError::InvalidTime { .. })
        ));
    }
}
