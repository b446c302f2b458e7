//! Solver identities and per-run outcomes
//!
//! This module defines the closed set of solvers the benchmark knows about,
//! how each solver's logs must be interpreted, and the [`SolveResult`] record
//! produced for every (instance, solver) pair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell values that never count as a solved run in a CPU table
pub const UNSOLVED_MARKERS: [&str; 5] = ["", "TIMEOUT", "OUT_OF_MEMORY", "ERROR", "-"];

/// Check whether a CPU table cell records a solved run
#[must_use]
pub fn is_solved_cell(value: &str) -> bool {
    !UNSOLVED_MARKERS.contains(&value)
}

/// Failure classification for a run without a fixed-point count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortKind {
    /// CPU time reached the budget
    Timeout,
    /// Peak memory exceeded the ceiling
    OutOfMemory,
    /// Anything else
    UnknownError,
}

impl AbortKind {
    /// Marker written into CPU tables
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::UnknownError => "ERROR",
        }
    }

    /// Parse a CPU table marker
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "TIMEOUT" => Some(Self::Timeout),
            "OUT_OF_MEMORY" => Some(Self::OutOfMemory),
            "ERROR" => Some(Self::UnknownError),
            _ => None,
        }
    }
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wording a solver uses to report its fixed-point count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuccessPattern {
    /// `Found N fixed points`
    FixedPoints,
    /// A bare integer at the start of a line
    LeadingCount,
    /// `SAT (full) : N`
    SatFull,
    /// `Found N steady states`
    SteadyStates,
    /// `exact arb int N`
    ExactCount,
}

/// How the logs of a solver are turned into a [`SolveResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPolicy {
    /// Success, then timeout, then memory, then error
    Default(SuccessPattern),
    /// Timeout is checked before the success marker
    TimeoutFirst(SuccessPattern),
    /// Preprocessing log followed by an optional search log
    TwoStage(SuccessPattern),
    /// `s UNSATISFIABLE` means zero fixed points, otherwise [`LogPolicy::Default`]
    Proposed(SuccessPattern),
    /// Results arrive as a CSV from a separately run tool
    External,
}

/// The solvers of the benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Solver {
    /// AEON fixed-point enumeration
    Aeon,
    /// fASP, conjunctive encoding
    FaspConj,
    /// fASP, source encoding
    FaspSrc,
    /// Hybrid BMSA (the proposed method)
    HybridBmsa,
    /// PyBoolNet steady states
    #[serde(rename = "PYBOOLNET")]
    PyBoolNet,
    /// bioLQM conversion followed by BMSA
    Saf,
    /// bioLQM conversion followed by a model counter
    SafSstd,
    /// Positive feedback vertex set enumeration
    Pfvs,
}

impl Solver {
    /// Every solver, in table column order
    pub const ALL: [Solver; 8] = [
        Solver::Aeon,
        Solver::FaspConj,
        Solver::FaspSrc,
        Solver::HybridBmsa,
        Solver::PyBoolNet,
        Solver::Saf,
        Solver::SafSstd,
        Solver::Pfvs,
    ];

    /// Column header used in result tables
    #[must_use]
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Aeon => "AEON",
            Self::FaspConj => "fASP_conj",
            Self::FaspSrc => "fASP_src",
            Self::HybridBmsa => "Hybrid_BMSA",
            Self::PyBoolNet => "PyBoolNet",
            Self::Saf => "SAF",
            Self::SafSstd => "SAF_sstd",
            Self::Pfvs => "PFVS",
        }
    }

    /// Directory holding this solver's logs
    #[must_use]
    pub fn log_dir(&self) -> &'static str {
        match self {
            Self::Aeon => "aeon",
            Self::FaspConj => "fasp_conj",
            Self::FaspSrc => "fasp_src",
            Self::HybridBmsa => "hybrid_bmsa",
            Self::PyBoolNet => "pyboolnet",
            Self::Saf => "saf",
            Self::SafSstd => "saf_sstd",
            Self::Pfvs => "pfvs",
        }
    }

    /// Look a solver up by its result-table column header
    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.column_name() == name)
    }

    /// Log interpretation for this solver
    #[must_use]
    pub fn policy(&self) -> LogPolicy {
        match self {
            Self::Aeon => LogPolicy::Default(SuccessPattern::FixedPoints),
            Self::FaspConj | Self::FaspSrc => LogPolicy::Default(SuccessPattern::LeadingCount),
            Self::HybridBmsa => LogPolicy::Proposed(SuccessPattern::SatFull),
            Self::PyBoolNet => LogPolicy::TimeoutFirst(SuccessPattern::SteadyStates),
            Self::Saf => LogPolicy::TwoStage(SuccessPattern::SatFull),
            Self::SafSstd => LogPolicy::TwoStage(SuccessPattern::ExactCount),
            Self::Pfvs => LogPolicy::External,
        }
    }

    /// Whether BBM logs sit in one directory per run
    #[must_use]
    pub fn nested_logs(&self) -> bool {
        matches!(self, Self::HybridBmsa)
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Outcome of one solver on one instance
///
/// A final result is either a success (`num_fixed_points` set) or a failure
/// (`abort_kind` set), never both.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SolveResult {
    /// Number of fixed points found
    pub num_fixed_points: Option<u128>,
    /// User plus system CPU time in seconds
    pub cpu_seconds: Option<f64>,
    /// Failure classification
    pub abort_kind: Option<AbortKind>,
}

impl SolveResult {
    /// A successful run
    #[must_use]
    pub fn success(num_fixed_points: u128, cpu_seconds: f64) -> Self {
        Self {
            num_fixed_points: Some(num_fixed_points),
            cpu_seconds: Some(cpu_seconds),
            abort_kind: None,
        }
    }

    /// A failed run without usable CPU time
    #[must_use]
    pub fn aborted(kind: AbortKind) -> Self {
        Self {
            num_fixed_points: None,
            cpu_seconds: None,
            abort_kind: Some(kind),
        }
    }

    /// A failed run that still reported its CPU time
    #[must_use]
    pub fn aborted_after(kind: AbortKind, cpu_seconds: f64) -> Self {
        Self {
            cpu_seconds: Some(cpu_seconds),
            ..Self::aborted(kind)
        }
    }

    /// Whether a fixed-point count was obtained
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.num_fixed_points.is_some()
    }

    /// Value written into a CPU table
    #[must_use]
    pub fn cpu_cell(&self) -> String {
        match (self.num_fixed_points, self.cpu_seconds, self.abort_kind) {
            (Some(_), Some(cpu), _) => format!("{:.2}", cpu),
            (_, _, Some(kind)) => kind.as_str().to_string(),
            _ => "-".to_string(),
        }
    }

    /// Value written into a fixed-point table
    #[must_use]
    pub fn fixed_point_cell(&self) -> String {
        self.num_fixed_points
            .map(|n| n.to_string())
            .unwrap_or_default()
    }
}

/// Outcome counts over a set of results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveSummary {
    /// Number of results
    pub total: usize,
    /// Runs with a fixed-point count
    pub solved: usize,
    /// Timeouts
    pub timeouts: usize,
    /// Memory outs
    pub memouts: usize,
    /// Other failures
    pub errors: usize,
    /// Total CPU time of solved runs
    pub solved_cpu_seconds: f64,
}

impl SolveSummary {
    /// Count outcomes
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a SolveResult>) -> Self {
        let mut summary = Self::default();

        for result in results {
            summary.total += 1;
            match result.abort_kind {
                None if result.is_solved() => {
                    summary.solved += 1;
                    summary.solved_cpu_seconds += result.cpu_seconds.unwrap_or(0.0);
                }
                Some(AbortKind::Timeout) => summary.timeouts += 1,
                Some(AbortKind::OutOfMemory) => summary.memouts += 1,
                Some(AbortKind::UnknownError) | None => summary.errors += 1,
            }
        }

        summary
    }

    /// Solved runs as a percentage of all runs
    #[must_use]
    pub fn solve_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.solved as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_kind_markers() {
        assert_eq!(AbortKind::Timeout.as_str(), "TIMEOUT");
        assert_eq!(AbortKind::UnknownError.as_str(), "ERROR");
        assert_eq!(AbortKind::parse("OUT_OF_MEMORY"), Some(AbortKind::OutOfMemory));
        assert_eq!(AbortKind::parse("12.5"), None);
    }

    #[test]
    fn test_solver_column_names_round_trip() {
        for solver in Solver::ALL {
            assert_eq!(Solver::from_column_name(solver.column_name()), Some(solver));
        }
        assert_eq!(Solver::from_column_name("Instance"), None);
    }

    #[test]
    fn test_solver_policies() {
        assert_eq!(
            Solver::PyBoolNet.policy(),
            LogPolicy::TimeoutFirst(SuccessPattern::SteadyStates)
        );
        assert_eq!(
            Solver::SafSstd.policy(),
            LogPolicy::TwoStage(SuccessPattern::ExactCount)
        );
        assert_eq!(Solver::Pfvs.policy(), LogPolicy::External);
    }

    #[test]
    fn test_cells() {
        let ok = SolveResult::success(42, 10.0);
        assert_eq!(ok.cpu_cell(), "10.00");
        assert_eq!(ok.fixed_point_cell(), "42");

        let to = SolveResult::aborted(AbortKind::Timeout);
        assert_eq!(to.cpu_cell(), "TIMEOUT");
        assert_eq!(to.fixed_point_cell(), "");

        let oom = SolveResult::aborted_after(AbortKind::OutOfMemory, 12.0);
        assert_eq!(oom.cpu_cell(), "OUT_OF_MEMORY");
        assert!(!oom.is_solved());
    }

    #[test]
    fn test_is_solved_cell() {
        assert!(is_solved_cell("12.34"));
        assert!(!is_solved_cell(""));
        assert!(!is_solved_cell("TIMEOUT"));
        assert!(!is_solved_cell("-"));
    }

    #[test]
    fn test_summary_from_results() {
        let results = [
            SolveResult::success(1, 2.0),
            SolveResult::success(3, 4.0),
            SolveResult::aborted(AbortKind::Timeout),
            SolveResult::aborted_after(AbortKind::OutOfMemory, 5.0),
            SolveResult::aborted(AbortKind::UnknownError),
        ];

        let summary = SolveSummary::from_results(&results);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.solved, 2);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.memouts, 1);
        assert_eq!(summary.errors, 1);
        assert!((summary.solved_cpu_seconds - 6.0).abs() < 1e-9);
        assert!((summary.solve_rate() - 40.0).abs() < 1e-9);
    }
}
