//! Instance-name reconciliation
//!
//! Results produced by separately run tools name their instances their own
//! way (`pfvs-001`, `model-bbm-001`, ...). This module maps those names onto
//! the `Instance` column of a canonical table and writes the foreign column
//! into it.

use crate::config::{MergeConfig, MergeTarget};
use crate::table::{CsvTable, TableError, TableKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for reconciliation
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A table or result file does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

/// Result type for reconciliation
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// One row of a foreign result file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForeignResult {
    /// Instance name as the foreign tool wrote it
    pub instance: String,
    /// Solver name
    #[serde(default)]
    pub solver: String,
    /// `solved` or a failure status
    pub status: String,
    /// Elapsed seconds
    #[serde(default)]
    pub time_sec: String,
    /// Number of fixed points
    #[serde(default)]
    pub num_fp: String,
}

impl ForeignResult {
    /// Whether the foreign run solved the instance
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.status.eq_ignore_ascii_case("solved")
    }

    /// Cell written into a canonical table
    #[must_use]
    pub fn cell(&self, kind: TableKind) -> String {
        match (kind, self.is_solved()) {
            (TableKind::Cpu, true) => self.time_sec.clone(),
            (TableKind::Cpu, false) => "TIMEOUT".to_string(),
            (TableKind::FixedPoints, true) => format!("{}*", self.num_fp),
            (TableKind::FixedPoints, false) => String::new(),
        }
    }
}

/// Find the canonical id a foreign instance name refers to
///
/// Tries a case-insensitive exact match, then a match with hyphens read as
/// underscores, then the longest canonical id contained in the foreign name
/// or containing it. Ties keep the first id in `canonical` order.
#[must_use]
pub fn match_instance<'a>(foreign: &str, canonical: &[&'a str]) -> Option<&'a str> {
    let raw = foreign.to_lowercase();
    let lowered: Vec<String> = canonical.iter().map(|c| c.to_lowercase()).collect();

    if let Some(i) = lowered.iter().position(|c| *c == raw) {
        return Some(canonical[i]);
    }

    let normalized = raw.replace('-', "_");
    if let Some(i) = lowered
        .iter()
        .position(|c| c.replace('-', "_") == normalized)
    {
        return Some(canonical[i]);
    }

    let mut best: Option<usize> = None;
    for (i, c) in lowered.iter().enumerate() {
        if !(raw.contains(c.as_str()) || c.contains(raw.as_str())) {
            continue;
        }
        if best.is_none_or(|b| canonical[i].len() > canonical[b].len()) {
            best = Some(i);
        }
    }
    best.map(|i| canonical[i])
}

/// Read foreign results from CSV text
pub fn read_foreign<R: Read>(reader: R) -> ReconcileResult<Vec<ForeignResult>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Foreign results keyed by canonical id
///
/// Unmatched names are reported and dropped. A later row for the same
/// canonical id replaces an earlier one.
pub fn match_foreign(
    rows: Vec<ForeignResult>,
    canonical: &[&str],
) -> HashMap<String, ForeignResult> {
    let mut matched = HashMap::new();
    for row in rows {
        match match_instance(&row.instance, canonical) {
            Some(id) => {
                debug!("{} -> {}", row.instance, id);
                matched.insert(id.to_string(), row);
            }
            None => warn!("Unmatched instance: {}", row.instance),
        }
    }
    matched
}

/// Read and match foreign result files, in order
pub fn load_foreign(
    paths: &[PathBuf],
    canonical: &[&str],
) -> ReconcileResult<HashMap<String, ForeignResult>> {
    let mut data = HashMap::new();
    for path in paths {
        let file = open(path)?;
        data.extend(match_foreign(read_foreign(file)?, canonical));
    }
    Ok(data)
}

/// Write the foreign column into a canonical table
///
/// Rows without a foreign result get an empty cell.
pub fn merge_into(
    table: &mut CsvTable,
    data: &HashMap<String, ForeignResult>,
    kind: TableKind,
    column: &str,
) {
    table.set_column(column, |instance| {
        data.get(instance)
            .map(|r| r.cell(kind))
            .unwrap_or_default()
    });
}

/// Outcome of one table merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Updated table
    pub table: PathBuf,
    /// Rows that received a foreign result
    pub matched: usize,
    /// Rows of the table
    pub rows: usize,
}

/// Merge one target's foreign sources into its table, replacing it atomically
pub fn merge_target(
    results_dir: &Path,
    target: &MergeTarget,
    column: &str,
) -> ReconcileResult<MergeReport> {
    let table_path = results_dir.join(&target.table);
    if !table_path.is_file() {
        return Err(ReconcileError::NotFound(table_path));
    }

    let mut table = CsvTable::read(&table_path)?;
    let canonical: Vec<&str> = table.instances().collect();
    let sources: Vec<PathBuf> = target.sources.iter().map(|s| results_dir.join(s)).collect();
    let data = load_foreign(&sources, &canonical)?;
    let matched = canonical.iter().filter(|id| data.contains_key(**id)).count();

    merge_into(&mut table, &data, target.kind, column);
    table.write_atomic(&table_path)?;
    info!("Merged {} of {} rows into {}", matched, table.len(), table_path.display());

    Ok(MergeReport {
        table: table_path,
        matched,
        rows: table.len(),
    })
}

/// Run every merge of a merge map
pub fn merge_all(results_dir: &Path, config: &MergeConfig) -> ReconcileResult<Vec<MergeReport>> {
    config
        .targets
        .iter()
        .map(|t| merge_target(results_dir, t, &config.column))
        .collect()
}

fn open(path: &Path) -> ReconcileResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReconcileError::NotFound(path.to_path_buf()),
        _ => ReconcileError::Io(e),
    })
}
