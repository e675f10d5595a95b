//! One column per worker, one row per completed test.
//!
//! ```text
//! |✓| | |   10%     12ms  Billing\InvoiceTest::test_totals
//! | |F| |   20%    340ms  Billing\InvoiceTest::test_refund
//! -------
//! ```

use std::io::Write;
use tracing::debug;

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, Severity, TestResult};

const GREEN: &str = "\x1b[30;42m";
const YELLOW: &str = "\x1b[30;43m";
const RED: &str = "\x1b[37;41m";
const RESET: &str = "\x1b[0m";

pub struct LaneReporter {
    sink: Box<dyn Write + Send>,
    colorize: bool,
    worker_count: usize,
    expected_tests: usize,
    executed_tests: usize,
    problems: Vec<(String, TestResult)>,
}

impl LaneReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            colorize: true,
            worker_count: 0,
            expected_tests: 0,
            executed_tests: 0,
            problems: Vec::new(),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn glyph(&self, result: &TestResult) -> String {
        match result.worst_severity() {
            None => self.paint("✓", GREEN),
            Some(Severity::Warning) => self.paint(Severity::Warning.symbol(), YELLOW),
            Some(severity) => self.paint(severity.symbol(), RED),
        }
    }

    fn percent(&self) -> usize {
        if self.expected_tests == 0 {
            100
        } else {
            self.executed_tests * 100 / self.expected_tests
        }
    }

    fn write_lanes(&mut self, lane: usize, mark: &str, details: &str) {
        let mut line = String::new();
        for i in 0..self.worker_count.max(lane + 1) {
            line.push('|');
            if i == lane {
                line.push_str(mark);
            } else {
                line.push(' ');
            }
        }
        line.push_str("| ");
        line.push_str(details);
        self.emit(&line);
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.sink, "{}", line) {
            debug!("Lane reporter write failed: {}", e);
        }
    }
}

impl TestEventListener for LaneReporter {
    fn begin(&mut self, worker_count: usize, expected_tests: usize) {
        self.worker_count = worker_count;
        self.expected_tests = expected_tests;
        self.executed_tests = 0;
    }

    fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        self.executed_tests += 1;
        let mark = self.glyph(result);
        let details = format!(
            "{:3}%  {:5}ms  {}",
            self.percent(),
            result.elapsed.as_millis(),
            result.qualified_name()
        );
        self.write_lanes(worker.lane, &mark, &details);

        if !result.errors.is_empty() {
            self.problems.push((worker.label.clone(), result.clone()));
        }
    }

    fn on_exit(&mut self, worker: &WorkerInfo, exit_code: Option<i32>) {
        if exit_code != Some(0) {
            let mark = self.paint("!", RED);
            let status = match exit_code {
                Some(code) => format!("exited with status {}", code),
                None => "exited".to_string(),
            };
            self.write_lanes(worker.lane, &mark, &format!("{} {}", worker, status));
        }
    }

    fn end(&mut self, summary: &RunSummary) {
        self.emit(&"-".repeat(self.worker_count * 2 + 1));

        let problems = std::mem::take(&mut self.problems);
        for (i, (label, result)) in problems.iter().enumerate() {
            self.emit("");
            self.emit(&format!("{}) {} ({})", i + 1, result.qualified_name(), label));
            for entry in &result.errors {
                let message = entry.message.replace('\n', "\n      ");
                self.emit(&format!("   [{}] {}", entry.severity.symbol(), message));
            }
        }

        for abandoned in &summary.abandoned {
            self.emit("");
            let line = format!(
                "Abandoned {} when {} exited",
                abandoned.request,
                WorkerInfo::label_for(abandoned.lane)
            );
            let line = self.paint(&line, RED);
            self.emit(&line);
        }

        self.emit("");
        let verdict = if summary.is_all_passed() {
            self.paint("OK", GREEN)
        } else {
            self.paint("FAILED", RED)
        };
        self.emit(&format!("{} {}", verdict, summary));
        if let Err(e) = self.sink.flush() {
            debug!("Lane reporter flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorEntry, TestRequest};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Write sink the test can read back.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn result(id: u64, millis: u64) -> TestResult {
        let request = TestRequest {
            id,
            class: "Suite".to_string(),
            name: format!("test_{id}"),
        };
        TestResult::pass(&request, Duration::from_millis(millis))
    }

    #[test]
    fn test_lane_rows() {
        let sink = Shared::default();
        let mut reporter = LaneReporter::new(Box::new(sink.clone())).no_color();

        reporter.begin(3, 4);
        reporter.test_completed(&WorkerInfo::new(0), &result(1, 12));
        reporter.test_completed(
            &WorkerInfo::new(2),
            &result(2, 340).with_error(ErrorEntry::failure("expected 2, got 3")),
        );

        let text = sink.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "|✓| | |  25%     12ms  Suite::test_1");
        assert_eq!(lines[1], "| | |F|  50%    340ms  Suite::test_2");
    }

    #[test]
    fn test_end_lists_problems() {
        let sink = Shared::default();
        let mut reporter = LaneReporter::new(Box::new(sink.clone())).no_color();

        reporter.begin(2, 2);
        reporter.test_completed(
            &WorkerInfo::new(1),
            &result(1, 5).with_error(ErrorEntry::warning("risky")),
        );
        reporter.test_completed(&WorkerInfo::new(0), &result(2, 5));
        reporter.on_exit(&WorkerInfo::new(0), Some(0));
        let mut summary = RunSummary::new(2, 2);
        summary.executed_tests = 2;
        reporter.end(&summary);

        let text = sink.text();
        assert!(text.contains("|W| "));
        assert!(text.contains("-----\n"));
        assert!(text.contains("1) Suite::test_1 (WorkerB)\n   [W] risky"));
        assert!(text.contains("OK Executed: 2/2"));
        assert!(!text.contains("exited"));
    }

    #[test]
    fn test_crashed_worker_row() {
        let sink = Shared::default();
        let mut reporter = LaneReporter::new(Box::new(sink.clone())).no_color();
        reporter.begin(2, 1);
        reporter.on_exit(&WorkerInfo::new(1), Some(139));
        assert_eq!(sink.text(), "| |!| WorkerB exited with status 139\n");
    }

    #[test]
    fn test_colored_glyph() {
        let sink = Shared::default();
        let mut reporter = LaneReporter::new(Box::new(sink.clone()));
        reporter.begin(1, 1);
        reporter.test_completed(
            &WorkerInfo::new(0),
            &result(1, 1).with_error(ErrorEntry::error("boom")),
        );
        assert!(sink.text().starts_with("|\x1b[37;41mE\x1b[0m|"));
    }
}
