//! Solver log parsing
//!
//! Every solver run is wrapped in `/usr/bin/time -v`, so each log ends with
//! the wrapper's resource report. [`LogParser`] combines that report with the
//! solver's own success marker and classifies the run according to the
//! solver's [`LogPolicy`].

use crate::config::Limits;
use crate::result::{AbortKind, LogPolicy, SolveResult, Solver, SuccessPattern};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Crash signatures of the first-stage converter
pub const FIRST_STAGE_CRASHES: [&str; 2] = [
    "javax.xml.stream.XMLStreamException",
    "java.lang.NegativeArraySizeException",
];

/// Marker printed by the first-stage wrapper after a clean exit
pub const FIRST_STAGE_EXIT_OK: &str = "+ exit_status=0";

/// Error type for log parsing
///
/// Apart from IO and regex construction, every variant means the log does not
/// look like a log of a finished run and must not be classified.
#[derive(Error, Debug)]
pub enum LogError {
    /// IO error reading a log
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Log path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// Pattern failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
    /// The resource report is incomplete
    #[error("Missing resource usage line: {0}")]
    MissingResourceUsage(&'static str),
    /// A captured number could not be read
    #[error("Invalid number in log: {0}")]
    InvalidNumber(String),
    /// The log contradicts what a finished run must look like
    #[error("Invariant violated: {0}")]
    Invariant(String),
    /// The solver has no log-based policy
    #[error("{0} results are not read from logs")]
    NotLogBased(Solver),
}

impl LogError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for log parsing
pub type LogResult<T> = Result<T, LogError>;

/// Figures from the resource report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    /// User plus system time in seconds
    pub cpu_seconds: f64,
    /// Peak resident set size in kilobytes
    pub mem_kb: u64,
}

/// Log files belonging to one (instance, solver) run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverLogs {
    /// A single log
    Single(PathBuf),
    /// A first-stage log and, if the first stage handed over, a second log
    TwoStage {
        /// Preprocessing log
        first: PathBuf,
        /// Search log
        second: Option<PathBuf>,
    },
}

/// Where a two-stage run stands after reading its first log
#[derive(Debug, Clone, Copy, PartialEq)]
enum FirstStage {
    /// The run ended in the first stage
    Finished(SolveResult),
    /// The second stage ran; its CPU time adds to this one
    Handoff {
        /// First-stage CPU time
        cpu_seconds: f64,
    },
}

struct Patterns {
    user_time: Regex,
    system_time: Regex,
    max_rss: Regex,
    unsatisfiable: Regex,
    fixed_points: Regex,
    leading_count: Regex,
    sat_full: Regex,
    steady_states: Regex,
    exact_count: Regex,
}

impl Patterns {
    fn compile() -> LogResult<Self> {
        Ok(Self {
            user_time: Regex::new(r"(?m)^\s*User time \(seconds\): (\d+(?:\.\d+)?)")?,
            system_time: Regex::new(r"(?m)^\s*System time \(seconds\): (\d+(?:\.\d+)?)")?,
            max_rss: Regex::new(r"Maximum resident set size \(kbytes\): (\d+)")?,
            unsatisfiable: Regex::new(r"(?m)^s UNSATISFIABLE")?,
            fixed_points: Regex::new(r"Found (\d+) fixed points")?,
            leading_count: Regex::new(r"(?m)^(\d+)")?,
            sat_full: Regex::new(r"SAT \(full\)\s*:\s*(\d+)")?,
            steady_states: Regex::new(r"Found (\d+) steady states")?,
            exact_count: Regex::new(r"exact arb int (\d+)")?,
        })
    }

    fn success(&self, pattern: SuccessPattern) -> &Regex {
        match pattern {
            SuccessPattern::FixedPoints => &self.fixed_points,
            SuccessPattern::LeadingCount => &self.leading_count,
            SuccessPattern::SatFull => &self.sat_full,
            SuccessPattern::SteadyStates => &self.steady_states,
            SuccessPattern::ExactCount => &self.exact_count,
        }
    }
}

/// Parser turning solver logs into [`SolveResult`]s
pub struct LogParser {
    limits: Limits,
    patterns: Patterns,
}

impl LogParser {
    /// Create a parser classifying runs against the given limits
    pub fn new(limits: Limits) -> LogResult<Self> {
        Ok(Self {
            limits,
            patterns: Patterns::compile()?,
        })
    }

    /// Read the resource report of a log
    pub fn resource_usage(&self, text: &str) -> LogResult<ResourceUsage> {
        let user = capture_f64(&self.patterns.user_time, text)
            .ok_or(LogError::MissingResourceUsage("User time (seconds)"))??;
        let system = capture_f64(&self.patterns.system_time, text)
            .ok_or(LogError::MissingResourceUsage("System time (seconds)"))??;
        let mem_kb = self
            .patterns
            .max_rss
            .captures(text)
            .ok_or(LogError::MissingResourceUsage(
                "Maximum resident set size (kbytes)",
            ))?[1]
            .parse::<u64>()
            .map_err(|e| LogError::InvalidNumber(e.to_string()))?;

        Ok(ResourceUsage {
            cpu_seconds: user + system,
            mem_kb,
        })
    }

    /// Fixed-point count reported by the success marker, if any
    pub fn find_count(&self, text: &str, pattern: SuccessPattern) -> LogResult<Option<u128>> {
        self.patterns
            .success(pattern)
            .captures(text)
            .map(|caps| {
                caps[1]
                    .parse::<u128>()
                    .map_err(|e| LogError::InvalidNumber(format!("{}: {}", &caps[1], e)))
            })
            .transpose()
    }

    /// Classify a log: success, then timeout, then memory, then error
    pub fn parse_default(&self, text: &str, pattern: SuccessPattern) -> LogResult<SolveResult> {
        let count = self.find_count(text, pattern)?;
        let usage = self.resource_usage(text)?;

        if let Some(n) = count {
            self.check_within_budget(usage.cpu_seconds)?;
            return Ok(SolveResult::success(n, usage.cpu_seconds));
        }
        Ok(self.classify_failure(usage))
    }

    /// Classify a log whose success marker can show up in timeout output
    pub fn parse_timeout_first(
        &self,
        text: &str,
        pattern: SuccessPattern,
    ) -> LogResult<SolveResult> {
        let count = self.find_count(text, pattern)?;
        let usage = self.resource_usage(text)?;

        if self.is_timeout(usage.cpu_seconds) {
            return Ok(SolveResult::aborted(AbortKind::Timeout));
        }
        match count {
            Some(n) => Ok(SolveResult::success(n, usage.cpu_seconds)),
            None => Ok(self.classify_failure(usage)),
        }
    }

    /// Classify a log of the proposed solver
    ///
    /// An unsatisfiable search space means the network has no fixed point.
    pub fn parse_proposed(&self, text: &str, pattern: SuccessPattern) -> LogResult<SolveResult> {
        let usage = self.resource_usage(text)?;

        if self.patterns.unsatisfiable.is_match(text) {
            self.check_within_budget(usage.cpu_seconds)?;
            return Ok(SolveResult::success(0, usage.cpu_seconds));
        }
        self.parse_default(text, pattern)
    }

    /// Classify a two-stage run from its first log and optional second log
    pub fn parse_two_stage(
        &self,
        first: &str,
        second: Option<&str>,
        pattern: SuccessPattern,
    ) -> LogResult<SolveResult> {
        match self.first_stage(first, second.is_some())? {
            FirstStage::Finished(result) => Ok(result),
            FirstStage::Handoff { cpu_seconds } => {
                let second = second.ok_or_else(|| {
                    LogError::Invariant("first stage handed over but no second log".to_string())
                })?;
                let mut result = self.parse_default(second, pattern)?;
                // Failed second stages keep their own classification
                if let Some(cpu) = result.cpu_seconds.filter(|_| result.is_solved()) {
                    let combined = cpu_seconds + cpu;
                    if combined > self.limits.time_budget_secs {
                        result = SolveResult::aborted(AbortKind::Timeout);
                    } else {
                        result.cpu_seconds = Some(combined);
                    }
                }
                Ok(result)
            }
        }
    }

    /// Classify a single-log run of the given solver
    pub fn parse_text(&self, solver: Solver, text: &str) -> LogResult<SolveResult> {
        match solver.policy() {
            LogPolicy::Default(p) => self.parse_default(text, p),
            LogPolicy::TimeoutFirst(p) => self.parse_timeout_first(text, p),
            LogPolicy::Proposed(p) => self.parse_proposed(text, p),
            LogPolicy::TwoStage(p) => self.parse_two_stage(text, None, p),
            LogPolicy::External => Err(LogError::NotLogBased(solver)),
        }
    }

    /// Read and classify the logs of one run
    pub fn parse_logs(&self, solver: Solver, logs: &SolverLogs) -> LogResult<SolveResult> {
        match (solver.policy(), logs) {
            (LogPolicy::TwoStage(p), SolverLogs::TwoStage { first, second }) => {
                debug!("Parsing two-stage logs {}", first.display());
                let first_text = read_log(first)?;
                let second_text = second.as_deref().map(read_log).transpose()?;
                self.parse_two_stage(&first_text, second_text.as_deref(), p)
            }
            (LogPolicy::TwoStage(_), SolverLogs::Single(path)) => Err(LogError::Invariant(
                format!("{} needs a first-stage log, got only {}", solver, path.display()),
            )),
            (_, SolverLogs::Single(path)) => {
                debug!("Parsing {} log {}", solver, path.display());
                self.parse_text(solver, &read_log(path)?)
            }
            (_, SolverLogs::TwoStage { first, .. }) => Err(LogError::Invariant(format!(
                "{} is single-stage, got first-stage log {}",
                solver,
                first.display()
            ))),
        }
    }

    fn first_stage(&self, text: &str, has_second: bool) -> LogResult<FirstStage> {
        if FIRST_STAGE_CRASHES.iter().any(|sig| text.contains(sig)) {
            if has_second {
                return Err(LogError::Invariant(
                    "first stage crashed but a second log exists".to_string(),
                ));
            }
            return Ok(FirstStage::Finished(SolveResult::aborted(
                AbortKind::UnknownError,
            )));
        }

        let usage = self.resource_usage(text)?;
        if self.is_timeout(usage.cpu_seconds) {
            return Ok(FirstStage::Finished(SolveResult::aborted(AbortKind::Timeout)));
        }

        if !text.contains(FIRST_STAGE_EXIT_OK) {
            return Err(LogError::Invariant(
                "first stage log lacks the exit marker".to_string(),
            ));
        }
        Ok(FirstStage::Handoff {
            cpu_seconds: usage.cpu_seconds,
        })
    }

    fn classify_failure(&self, usage: ResourceUsage) -> SolveResult {
        if self.is_timeout(usage.cpu_seconds) {
            SolveResult::aborted(AbortKind::Timeout)
        } else if usage.mem_kb > self.limits.memory_ceiling_kb {
            SolveResult::aborted_after(AbortKind::OutOfMemory, usage.cpu_seconds)
        } else {
            SolveResult::aborted_after(AbortKind::UnknownError, usage.cpu_seconds)
        }
    }

    fn is_timeout(&self, cpu_seconds: f64) -> bool {
        cpu_seconds >= self.limits.timeout_threshold()
    }

    fn check_within_budget(&self, cpu_seconds: f64) -> LogResult<()> {
        if cpu_seconds > self.limits.time_budget_secs {
            return Err(LogError::Invariant(format!(
                "success reported after {:.2}s, above the {}s budget",
                cpu_seconds, self.limits.time_budget_secs
            )));
        }
        Ok(())
    }
}

fn read_log(path: &Path) -> LogResult<String> {
    fs::read_to_string(path).map_err(|e| LogError::io(path, e))
}

fn capture_f64(re: &Regex, text: &str) -> Option<LogResult<f64>> {
    re.captures(text).map(|caps| {
        caps[1]
            .parse::<f64>()
            .map_err(|e| LogError::InvalidNumber(format!("{}: {}", &caps[1], e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_report(user: f64, system: f64, mem_kb: u64) -> String {
        format!(
            "\tCommand being timed: \"solver model.bnet\"\n\
             \tUser time (seconds): {:.2}\n\
             \tSystem time (seconds): {:.2}\n\
             \tPercent of CPU this job got: 99%\n\
             \tMaximum resident set size (kbytes): {}\n\
             \tExit status: 0\n",
            user, system, mem_kb
        )
    }

    fn log(body: &str, user: f64, system: f64, mem_kb: u64) -> String {
        format!("{}\n{}", body, time_report(user, system, mem_kb))
    }

    fn parser() -> LogParser {
        LogParser::new(Limits::default()).unwrap()
    }

    #[test]
    fn test_resource_usage() {
        let usage = parser()
            .resource_usage(&time_report(9.5, 0.5, 1000))
            .unwrap();
        assert!((usage.cpu_seconds - 10.0).abs() < 1e-9);
        assert_eq!(usage.mem_kb, 1000);
    }

    #[test]
    fn test_resource_usage_missing_lines() {
        let err = parser().resource_usage("Found 3 fixed points\n").unwrap_err();
        assert!(matches!(err, LogError::MissingResourceUsage(_)));

        let no_mem = "User time (seconds): 1.00\nSystem time (seconds): 0.00\n";
        let err = parser().resource_usage(no_mem).unwrap_err();
        assert!(matches!(
            err,
            LogError::MissingResourceUsage("Maximum resident set size (kbytes)")
        ));
    }

    #[test]
    fn test_default_success() {
        let text = log("Found 42 fixed points", 9.0, 1.0, 1000);
        let result = parser()
            .parse_default(&text, SuccessPattern::FixedPoints)
            .unwrap();
        assert_eq!(result.num_fixed_points, Some(42));
        assert_eq!(result.cpu_seconds, Some(10.0));
        assert_eq!(result.abort_kind, None);
    }

    #[test]
    fn test_default_timeout_boundary() {
        let p = parser();
        let at = log("solving...", 1797.0, 0.0, 70_000_000);
        assert_eq!(
            p.parse_default(&at, SuccessPattern::FixedPoints)
                .unwrap()
                .abort_kind,
            Some(AbortKind::Timeout)
        );

        let below = log("solving...", 1796.9, 0.0, 1000);
        assert_eq!(
            p.parse_default(&below, SuccessPattern::FixedPoints)
                .unwrap()
                .abort_kind,
            Some(AbortKind::UnknownError)
        );
    }

    #[test]
    fn test_default_out_of_memory() {
        let text = log("std::bad_alloc", 100.0, 2.0, 60_000_001);
        let result = parser()
            .parse_default(&text, SuccessPattern::FixedPoints)
            .unwrap();
        assert_eq!(result.abort_kind, Some(AbortKind::OutOfMemory));
        assert_eq!(result.num_fixed_points, None);
    }

    #[test]
    fn test_default_memory_at_ceiling_is_error() {
        let text = log("segfault", 1.0, 0.0, 60_000_000);
        let result = parser()
            .parse_default(&text, SuccessPattern::FixedPoints)
            .unwrap();
        assert_eq!(result.abort_kind, Some(AbortKind::UnknownError));
    }

    #[test]
    fn test_default_success_over_budget_is_invariant() {
        let text = log("Found 1 fixed points", 1800.5, 0.0, 10);
        let err = parser()
            .parse_default(&text, SuccessPattern::FixedPoints)
            .unwrap_err();
        assert!(matches!(err, LogError::Invariant(_)));
    }

    #[test]
    fn test_success_patterns() {
        let p = parser();
        let cases = [
            ("12\nanswers", SuccessPattern::LeadingCount, 12),
            ("SAT (full) : 7", SuccessPattern::SatFull, 7),
            ("SAT (full): 8", SuccessPattern::SatFull, 8),
            ("Found 5 steady states", SuccessPattern::SteadyStates, 5),
            ("c s exact arb int 340282366920938463463374607431768211455", SuccessPattern::ExactCount, u128::MAX),
        ];
        for (body, pattern, expected) in cases {
            assert_eq!(p.find_count(body, pattern).unwrap(), Some(expected), "{}", body);
        }
    }

    #[test]
    fn test_leading_count_ignores_time_report() {
        let text = log("no answer", 1.0, 0.0, 10);
        assert_eq!(
            parser()
                .find_count(&text, SuccessPattern::LeadingCount)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_timeout_first_beats_success() {
        let p = parser();
        let text = log("Found 3 steady states", 1798.0, 0.0, 10);
        assert_eq!(
            p.parse_timeout_first(&text, SuccessPattern::SteadyStates)
                .unwrap(),
            SolveResult::aborted(AbortKind::Timeout)
        );

        let fast = log("Found 3 steady states", 2.0, 0.0, 10);
        assert_eq!(
            p.parse_timeout_first(&fast, SuccessPattern::SteadyStates)
                .unwrap(),
            SolveResult::success(3, 2.0)
        );
    }

    #[test]
    fn test_timeout_first_without_marker_out_of_memory() {
        let text = log("MemoryError", 40.0, 0.0, 70_000_000);
        let result = parser().parse_text(Solver::PyBoolNet, &text).unwrap();
        assert_eq!(result.abort_kind, Some(AbortKind::OutOfMemory));
        assert_eq!(result.num_fixed_points, None);
    }

    #[test]
    fn test_proposed_unsatisfiable_is_zero() {
        let text = log("c solving\ns UNSATISFIABLE", 3.0, 0.0, 10);
        let result = parser()
            .parse_proposed(&text, SuccessPattern::SatFull)
            .unwrap();
        assert_eq!(result, SolveResult::success(0, 3.0));
    }

    #[test]
    fn test_proposed_unsatisfiable_over_budget_is_invariant() {
        let text = log("s UNSATISFIABLE", 1800.5, 0.0, 10);
        let err = parser()
            .parse_proposed(&text, SuccessPattern::SatFull)
            .unwrap_err();
        assert!(matches!(err, LogError::Invariant(_)));
    }

    #[test]
    fn test_proposed_falls_back_to_default() {
        let text = log("SAT (full) : 9", 3.0, 0.0, 10);
        let result = parser().parse_text(Solver::HybridBmsa, &text).unwrap();
        assert_eq!(result, SolveResult::success(9, 3.0));
    }

    #[test]
    fn test_two_stage_crash() {
        let first = log("Exception: java.lang.NegativeArraySizeException", 1.0, 0.0, 10);
        let p = parser();
        assert_eq!(
            p.parse_two_stage(&first, None, SuccessPattern::SatFull)
                .unwrap(),
            SolveResult::aborted(AbortKind::UnknownError)
        );

        let second = log("SAT (full) : 1", 1.0, 0.0, 10);
        assert!(matches!(
            p.parse_two_stage(&first, Some(&second), SuccessPattern::SatFull),
            Err(LogError::Invariant(_))
        ));
    }

    #[test]
    fn test_two_stage_first_stage_timeout() {
        let first = log("converting", 1797.5, 0.0, 10);
        let result = parser()
            .parse_two_stage(&first, None, SuccessPattern::SatFull)
            .unwrap();
        assert_eq!(result, SolveResult::aborted(AbortKind::Timeout));
    }

    #[test]
    fn test_two_stage_combines_cpu() {
        let first = log("+ exit_status=0", 100.0, 0.0, 10);
        let second = log("SAT (full) : 4", 50.0, 0.0, 10);
        let result = parser()
            .parse_two_stage(&first, Some(&second), SuccessPattern::SatFull)
            .unwrap();
        assert_eq!(result, SolveResult::success(4, 150.0));
    }

    #[test]
    fn test_two_stage_combined_over_budget() {
        let first = log("+ exit_status=0", 1000.0, 0.0, 10);
        let second = log("exact arb int 4", 900.0, 0.0, 10);
        let result = parser()
            .parse_two_stage(&first, Some(&second), SuccessPattern::ExactCount)
            .unwrap();
        assert_eq!(result, SolveResult::aborted(AbortKind::Timeout));
    }

    #[test]
    fn test_two_stage_failed_second_stage_keeps_kind() {
        let p = parser();
        let first = log("+ exit_status=0", 900.0, 0.0, 10);
        let oom = log("std::bad_alloc", 1000.0, 0.0, 70_000_000);
        let result = p
            .parse_two_stage(&first, Some(&oom), SuccessPattern::SatFull)
            .unwrap();
        assert_eq!(result.abort_kind, Some(AbortKind::OutOfMemory));
        assert_eq!(result.cpu_seconds, Some(1000.0));

        let crash = log("Segmentation fault", 950.0, 0.0, 10);
        let result = p
            .parse_two_stage(&first, Some(&crash), SuccessPattern::SatFull)
            .unwrap();
        assert_eq!(result.abort_kind, Some(AbortKind::UnknownError));
    }

    #[test]
    fn test_two_stage_requires_exit_marker_and_second_log() {
        let p = parser();
        let no_marker = log("converting", 1.0, 0.0, 10);
        let second = log("SAT (full) : 4", 1.0, 0.0, 10);
        assert!(matches!(
            p.parse_two_stage(&no_marker, Some(&second), SuccessPattern::SatFull),
            Err(LogError::Invariant(_))
        ));

        let ok = log("+ exit_status=0", 1.0, 0.0, 10);
        assert!(matches!(
            p.parse_two_stage(&ok, None, SuccessPattern::SatFull),
            Err(LogError::Invariant(_))
        ));
    }

    #[test]
    fn test_external_solver_rejected() {
        let err = parser().parse_text(Solver::Pfvs, "").unwrap_err();
        assert!(matches!(err, LogError::NotLogBased(Solver::Pfvs)));
    }
}
