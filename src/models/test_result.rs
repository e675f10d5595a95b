//! Test result models
//!
//! Defines error severities, error entries, per-test results and the run summary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use super::test_unit::{qualify, TestRequest};

/// Severity of a single error entry.
///
/// Ordered `Warning < Failure < Error`; a result without entries has no severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Failure,
    Error,
}

impl Severity {
    /// Single-character marker used by the lane reporter
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Warning => "W",
            Severity::Failure => "F",
            Severity::Error => "E",
        }
    }

    /// Whether this severity fails the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Severity::Failure | Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Failure => write!(f, "failure"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One problem reported for a test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub severity: Severity,
    pub message: String,
}

impl ErrorEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Severity::Failure, message)
    }

    #[cfg(test)]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }
}

/// Outcome of executing one test unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: u64,
    pub class: String,
    pub name: String,
    #[serde(with = "elapsed_secs")]
    pub elapsed: Duration,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    /// Memory usage sample in bytes, when tracking is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

impl TestResult {
    pub fn pass(request: &TestRequest, elapsed: Duration) -> Self {
        Self {
            id: request.id,
            class: request.class.clone(),
            name: request.name.clone(),
            elapsed,
            errors: Vec::new(),
            memory: None,
        }
    }

    pub fn with_error(mut self, entry: ErrorEntry) -> Self {
        self.errors.push(entry);
        self
    }

    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.memory = Some(bytes);
        self
    }

    /// Highest severity among the error entries
    pub fn worst_severity(&self) -> Option<Severity> {
        self.errors.iter().map(|e| e.severity).max()
    }

    /// True when at least one entry is a failure or an error
    pub fn is_failed(&self) -> bool {
        self.errors.iter().any(|e| e.severity.is_fatal())
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.class, &self.name)
    }

    /// Request equivalent of this result, used when replaying logs
    pub fn to_request(&self) -> TestRequest {
        TestRequest {
            id: self.id,
            class: self.class.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.worst_severity() {
            Some(severity) => severity.symbol(),
            None => "✓",
        };
        write!(
            f,
            "{} #{} {} [{}ms]",
            status,
            self.id,
            self.qualified_name(),
            self.elapsed.as_millis()
        )
    }
}

/// Elapsed time is carried on the wire as fractional seconds.
mod elapsed_secs {
    use super::*;

    pub fn serialize<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(elapsed.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// A request lost because its worker exited before reporting a result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbandonedRequest {
    pub lane: usize,
    pub request: TestRequest,
    pub exit_code: Option<i32>,
}

/// Summary handed to listeners at the end of a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub worker_count: usize,
    pub expected_tests: usize,
    pub executed_tests: usize,
    pub dispatched_tests: usize,
    pub failed_tests: usize,
    pub abandoned: Vec<AbandonedRequest>,
    pub cancelled: bool,
    #[serde(with = "elapsed_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(worker_count: usize, expected_tests: usize) -> Self {
        Self {
            worker_count,
            expected_tests,
            ..Default::default()
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.executed_tests == 0 {
            0.0
        } else {
            ((self.executed_tests - self.failed_tests) as f64 / self.executed_tests as f64)
                * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed_tests == 0 && self.abandoned.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Executed: {}/{} | Failed: {} | Abandoned: {} | Workers: {} | Duration: {}ms",
            self.executed_tests,
            self.expected_tests,
            self.failed_tests,
            self.abandoned.len(),
            self.worker_count,
            self.elapsed.as_millis()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
