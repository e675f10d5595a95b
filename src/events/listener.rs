//! Listener contract consumed by reporters and policy subscribers.

use std::fmt;

use crate::models::{RunSummary, TestRequest, TestResult};

/// Identity of the lane an event came from.
///
/// Listeners only ever see this, never the transport, so live workers and
/// replayed logs look the same to them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkerInfo {
    pub lane: usize,
    pub label: String,
}

impl WorkerInfo {
    pub fn new(lane: usize) -> Self {
        Self {
            lane,
            label: Self::label_for(lane),
        }
    }

    pub fn with_label(lane: usize, label: impl Into<String>) -> Self {
        Self {
            lane,
            label: label.into(),
        }
    }

    /// `WorkerA`, `WorkerB`, ... `WorkerZ`, `WorkerAA`, ...
    pub fn label_for(lane: usize) -> String {
        let mut letters = Vec::new();
        let mut n = lane + 1;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.reverse();
        format!("Worker{}", String::from_utf8_lossy(&letters))
    }
}

impl fmt::Display for WorkerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Subscriber to run lifecycle events.
///
/// Over one run a listener receives exactly one `begin`, any number of
/// `test_started`/`test_completed` pairs in arrival order (not discovery
/// order), pass-through stream and exit notifications, and exactly one `end`.
pub trait TestEventListener: Send {
    fn begin(&mut self, _worker_count: usize, _expected_tests: usize) {}

    fn test_started(&mut self, _worker: &WorkerInfo, _request: &TestRequest) {}

    fn test_completed(&mut self, _worker: &WorkerInfo, _result: &TestResult) {}

    fn end(&mut self, _summary: &RunSummary) {}

    fn on_stdout(&mut self, _worker: &WorkerInfo, _data: &[u8]) {}

    fn on_stderr(&mut self, _worker: &WorkerInfo, _data: &[u8]) {}

    fn on_exit(&mut self, _worker: &WorkerInfo, _exit_code: Option<i32>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_labels() {
        assert_eq!(WorkerInfo::label_for(0), "WorkerA");
        assert_eq!(WorkerInfo::label_for(1), "WorkerB");
        assert_eq!(WorkerInfo::label_for(25), "WorkerZ");
        assert_eq!(WorkerInfo::label_for(26), "WorkerAA");
        assert_eq!(WorkerInfo::label_for(27), "WorkerAB");
    }

    #[test]
    fn test_custom_label() {
        let info = WorkerInfo::with_label(0, "WorkerB");
        assert_eq!(info.lane, 0);
        assert_eq!(info.to_string(), "WorkerB");
    }
}
