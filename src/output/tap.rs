//! TAP version 13 reporter.

use std::io::Write;
use tracing::debug;

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, TestResult};

pub struct TapReporter {
    sink: Box<dyn Write + Send>,
}

impl TapReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.sink, "{}", line) {
            debug!("TAP reporter write failed: {}", e);
        }
    }
}

impl TestEventListener for TapReporter {
    fn begin(&mut self, _worker_count: usize, expected_tests: usize) {
        self.emit("TAP version 13");
        self.emit(&format!("1..{}", expected_tests));
    }

    fn test_completed(&mut self, _worker: &WorkerInfo, result: &TestResult) {
        let status = if result.is_failed() { "not ok" } else { "ok" };
        self.emit(&format!(
            "{} {} - {}",
            status,
            result.id,
            result.qualified_name()
        ));

        if !result.errors.is_empty() {
            self.emit("  ---");
            for entry in &result.errors {
                let message = entry.message.replace("\r\n", "\n").replace('\n', "\n    ");
                self.emit(&format!("  {}: {}", entry.severity, message));
            }
            self.emit("  ...");
        }
    }

    fn end(&mut self, summary: &RunSummary) {
        for abandoned in &summary.abandoned {
            let code = abandoned
                .exit_code
                .map_or_else(|| "unknown".to_string(), |c| c.to_string());
            self.emit(&format!(
                "not ok {} - {} # worker exited with status {}",
                abandoned.request.id,
                abandoned.request.qualified_name(),
                code
            ));
        }
        if let Err(e) = self.sink.flush() {
            debug!("TAP reporter flush failed: {}", e);
        }
    }
}
