//! Result tables
//!
//! [`ResultTable`] is the typed (instance, solver) → [`SolveResult`] map built
//! by the collector. [`CsvTable`] is its persisted form: one row per instance,
//! an `Instance` column followed by one column per solver. Tables that
//! replace an existing file are written through [`atomic_replace`].

use crate::result::{SolveResult, Solver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

/// Name of the key column
pub const INSTANCE_COLUMN: &str = "Instance";

/// Error type for table operations
#[derive(Error, Debug)]
pub enum TableError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Temporary file could not replace the target
    #[error("Could not replace table: {0}")]
    Persist(#[from] tempfile::PersistError),
    /// A required column is absent
    #[error("Missing column: {0}")]
    MissingColumn(String),
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// What the solver cells of a table hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// CPU seconds or a failure marker
    Cpu,
    /// Fixed-point counts
    FixedPoints,
}

/// A CSV table keyed by the `Instance` column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    header: &'a [String],
    cells: &'a [String],
}

impl<'a> TableRow<'a> {
    /// The instance id of the row
    #[must_use]
    pub fn instance(&self) -> &'a str {
        &self.cells[0]
    }

    /// Cell of a named column
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.header.iter().position(|h| h == column)?;
        self.cells.get(idx).map(String::as_str)
    }

    /// Solver cells, paired with their column names
    pub fn solver_cells(self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.header[1..]
            .iter()
            .zip(&self.cells[1..])
            .map(|(h, c)| (h.as_str(), c.as_str()))
    }
}

impl CsvTable {
    /// Create an empty table with the given solver columns
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::with_key(INSTANCE_COLUMN, columns)
    }

    /// Create an empty table whose key column has another name
    #[must_use]
    pub fn with_key<S: Into<String>>(key: &str, columns: impl IntoIterator<Item = S>) -> Self {
        let mut header = vec![key.to_string()];
        header.extend(columns.into_iter().map(Into::into));
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Read a table from a CSV file
    pub fn read(path: impl AsRef<Path>) -> TableResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Read a table from CSV text
    pub fn from_reader<R: Read>(reader: R) -> TableResult<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let key = header
            .iter()
            .position(|h| h == INSTANCE_COLUMN)
            .ok_or_else(|| TableError::MissingColumn(INSTANCE_COLUMN.to_string()))?;
        let key_name = header.remove(key);
        header.insert(0, key_name);

        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            let id = row.remove(key);
            row.insert(0, id);
            rows.push(row);
        }

        Ok(Self { header, rows })
    }

    /// Column names, `Instance` first
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Every column except `Instance`
    #[must_use]
    pub fn solver_columns(&self) -> &[String] {
        &self.header[1..]
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.rows.iter().map(|cells| TableRow {
            header: &self.header,
            cells,
        })
    }

    /// Instance ids, in row order
    pub fn instances(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r[0].as_str())
    }

    /// Row of an instance
    #[must_use]
    pub fn row(&self, instance: &str) -> Option<TableRow<'_>> {
        self.rows().find(|r| r.instance() == instance)
    }

    /// Cells of a named column, in row order
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.header.iter().position(|h| h == name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Append a row; missing trailing cells are left empty
    pub fn push_row<S: Into<String>>(
        &mut self,
        instance: impl Into<String>,
        cells: impl IntoIterator<Item = S>,
    ) {
        let mut row = vec![instance.into()];
        row.extend(cells.into_iter().map(Into::into));
        row.resize(self.header.len(), String::new());
        self.rows.push(row);
    }

    /// Add or overwrite a column, computing each cell from the row's instance
    pub fn set_column(&mut self, name: &str, mut value: impl FnMut(&str) -> String) {
        let idx = match self.header.iter().position(|h| h == name) {
            Some(idx) => idx,
            None => {
                self.header.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.header.len() - 1
            }
        };
        for row in &mut self.rows {
            let cell = value(&row[0]);
            row[idx] = cell;
        }
    }

    /// Write the table as CSV
    pub fn write<W: Write>(&self, writer: W) -> TableResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Replace a file with this table without exposing partial content
    pub fn write_atomic(&self, path: impl AsRef<Path>) -> TableResult<()> {
        let path = path.as_ref();
        atomic_replace(path, |w| self.write(w))?;
        info!("Replaced {} ({} rows)", path.display(), self.len());
        Ok(())
    }
}

/// Write a file through a temporary sibling and rename it over the target
///
/// If `write` fails, the target is untouched and the temporary is removed.
pub fn atomic_replace(
    path: &Path,
    write: impl FnOnce(&mut dyn Write) -> TableResult<()>,
) -> TableResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Results of one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// Instance id
    pub instance: String,
    /// Result per solver
    pub results: BTreeMap<Solver, SolveResult>,
}

/// Typed (instance, solver) → result table
///
/// Rows keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    solvers: Vec<Solver>,
    rows: Vec<ResultRow>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResultTable {
    /// Create an empty table with the given solver columns
    #[must_use]
    pub fn new(solvers: Vec<Solver>) -> Self {
        Self {
            solvers,
            ..Default::default()
        }
    }

    /// Solver columns
    #[must_use]
    pub fn solvers(&self) -> &[Solver] {
        &self.solvers
    }

    /// Record a result, appending the instance row if needed
    pub fn insert(&mut self, instance: &str, solver: Solver, result: SolveResult) {
        if !self.solvers.contains(&solver) {
            self.solvers.push(solver);
        }
        let idx = match self.index.get(instance) {
            Some(&idx) => idx,
            None => {
                self.rows.push(ResultRow {
                    instance: instance.to_string(),
                    results: BTreeMap::new(),
                });
                self.index.insert(instance.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        self.rows[idx].results.insert(solver, result);
    }

    /// Result of a pair
    #[must_use]
    pub fn get(&self, instance: &str, solver: Solver) -> Option<&SolveResult> {
        let idx = *self.index.get(instance)?;
        self.rows[idx].results.get(&solver)
    }

    /// Results of one instance
    #[must_use]
    pub fn row(&self, instance: &str) -> Option<&ResultRow> {
        self.index.get(instance).map(|&idx| &self.rows[idx])
    }

    /// Rows in insertion order
    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// All results of one solver
    pub fn solver_results(&self, solver: Solver) -> impl Iterator<Item = &SolveResult> {
        self.rows.iter().filter_map(move |r| r.results.get(&solver))
    }

    /// Number of instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append the rows of another table
    pub fn extend(&mut self, other: &ResultTable) {
        for row in &other.rows {
            for (&solver, &result) in &row.results {
                self.insert(&row.instance, solver, result);
            }
        }
    }

    /// Render one kind of CSV table
    #[must_use]
    pub fn to_csv(&self, kind: TableKind) -> CsvTable {
        let mut table = CsvTable::new(self.solvers.iter().map(Solver::column_name));
        for row in &self.rows {
            let cells = self.solvers.iter().map(|s| match row.results.get(s) {
                Some(r) if kind == TableKind::Cpu => r.cpu_cell(),
                Some(r) => r.fixed_point_cell(),
                None if kind == TableKind::Cpu => "-".to_string(),
                None => String::new(),
            });
            table.push_row(row.instance.as_str(), cells);
        }
        table
    }

    /// CPU table
    #[must_use]
    pub fn to_cpu_csv(&self) -> CsvTable {
        self.to_csv(TableKind::Cpu)
    }

    /// Fixed-point table
    #[must_use]
    pub fn to_fixed_point_csv(&self) -> CsvTable {
        self.to_csv(TableKind::FixedPoints)
    }

    /// Rows restricted to some instances
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        let mut table = Self::new(self.solvers.clone());
        for row in self.rows.iter().filter(|r| keep(&r.instance)) {
            for (&solver, &result) in &row.results {
                table.insert(&row.instance, solver, result);
            }
        }
        table
    }

    /// Write the table as pretty JSON
    pub fn write_json<W: Write>(&self, writer: W) -> TableResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::AbortKind;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> ResultTable {
        let mut table = ResultTable::new(vec![Solver::FaspConj, Solver::HybridBmsa]);
        table.insert("001", Solver::FaspConj, SolveResult::success(4, 1.5));
        table.insert("001", Solver::HybridBmsa, SolveResult::aborted(AbortKind::Timeout));
        table.insert("002", Solver::HybridBmsa, SolveResult::success(0, 0.25));
        table
    }

    #[test]
    fn test_result_table_insert_and_get() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].instance, "001");
        assert_eq!(
            table.get("002", Solver::HybridBmsa),
            Some(&SolveResult::success(0, 0.25))
        );
        assert_eq!(table.get("002", Solver::FaspConj), None);
        assert_eq!(table.solver_results(Solver::HybridBmsa).count(), 2);
    }

    #[test]
    fn test_to_csv() {
        let table = sample();
        let cpu = table.to_csv(TableKind::Cpu);
        assert_eq!(cpu.header(), ["Instance", "fASP_conj", "Hybrid_BMSA"]);
        let row = cpu.row("001").unwrap();
        assert_eq!(row.get("fASP_conj"), Some("1.50"));
        assert_eq!(row.get("Hybrid_BMSA"), Some("TIMEOUT"));
        assert_eq!(cpu.row("002").unwrap().get("fASP_conj"), Some("-"));

        let fps = table.to_csv(TableKind::FixedPoints);
        assert_eq!(fps.row("001").unwrap().get("Hybrid_BMSA"), Some(""));
        assert_eq!(fps.row("002").unwrap().get("Hybrid_BMSA"), Some("0"));
    }

    #[test]
    fn test_csv_read_moves_instance_first() {
        let text = "A,Instance,B\n1,x,2\n3,y,4\n";
        let table = CsvTable::from_reader(text.as_bytes()).unwrap();
        assert_eq!(table.header(), ["Instance", "A", "B"]);
        assert_eq!(table.instances().collect::<Vec<_>>(), ["x", "y"]);
        assert_eq!(table.row("y").unwrap().get("A"), Some("3"));
    }

    #[test]
    fn test_csv_requires_instance_column() {
        let err = CsvTable::from_reader("a,b\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn(_)));
    }

    #[test]
    fn test_set_column_adds_then_overwrites() {
        let mut table = CsvTable::new(["S"]);
        table.push_row("a", ["1"]);
        table.push_row("b", ["2"]);

        table.set_column("PFVS", |inst| format!("{}!", inst));
        assert_eq!(table.row("b").unwrap().get("PFVS"), Some("b!"));

        table.set_column("PFVS", |_| String::new());
        assert_eq!(table.header().len(), 3);
        assert_eq!(table.row("a").unwrap().get("PFVS"), Some(""));
    }

    #[test]
    fn test_write_read_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cpu.csv");
        sample().to_cpu_csv().write_atomic(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Instance,fASP_conj,Hybrid_BMSA\n"));
        let table = CsvTable::read(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("Instance"), Some(vec!["001", "002"]));
        assert_eq!(table.column("PFVS"), None);
    }

    #[test]
    fn test_atomic_replace_keeps_original_on_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cpu.csv");
        fs::write(&path, "Instance,S\na,1\n").unwrap();

        let result = atomic_replace(&path, |w| {
            w.write_all(b"Instance,S,PF")?;
            Err(TableError::MissingColumn("interrupted".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Instance,S\na,1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cpu.csv");
        fs::write(&path, "old").unwrap();

        let mut table = CsvTable::new(["S"]);
        table.push_row("a", ["2"]);
        table.write_atomic(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Instance,S\na,2\n");
    }

    #[test]
    fn test_json_export() {
        let mut buf = Vec::new();
        sample().write_json(&mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["rows"][0]["instance"], "001");
        assert_eq!(json["rows"][0]["results"]["FASP_CONJ"]["num_fixed_points"], 4);
        assert_eq!(json["rows"][0]["results"]["HYBRID_BMSA"]["abort_kind"], "TIMEOUT");
    }
}
