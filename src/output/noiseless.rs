//! Quiet reporter: passing tests print nothing.

use std::io::Write;
use tracing::debug;

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, TestResult};

pub struct NoiselessReporter {
    sink: Box<dyn Write + Send>,
}

impl NoiselessReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.sink, "{}", line) {
            debug!("Noiseless reporter write failed: {}", e);
        }
    }
}

impl TestEventListener for NoiselessReporter {
    fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        let Some(severity) = result.worst_severity() else {
            return;
        };
        self.emit(&format!(
            "[{}] {} ({})",
            severity.symbol(),
            result.qualified_name(),
            worker
        ));
        for entry in &result.errors {
            let message = entry.message.replace('\n', "\n      ");
            self.emit(&format!("    {}: {}", entry.severity, message));
        }
    }

    fn on_exit(&mut self, worker: &WorkerInfo, exit_code: Option<i32>) {
        match exit_code {
            Some(0) => {}
            Some(code) => self.emit(&format!("[!] {} exited with status {}", worker, code)),
            None => self.emit(&format!("[!] {} exited", worker)),
        }
    }

    fn end(&mut self, summary: &RunSummary) {
        for abandoned in &summary.abandoned {
            self.emit(&format!(
                "[!] {} abandoned when {} exited",
                abandoned.request.qualified_name(),
                WorkerInfo::label_for(abandoned.lane)
            ));
        }

        let verdict = if summary.is_all_passed() { "OK" } else { "FAILED" };
        self.emit(&format!(
            "{} {:.1}% passed | {}",
            verdict,
            summary.pass_rate(),
            summary
        ));
        if let Err(e) = self.sink.flush() {
            debug!("Noiseless reporter flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AbandonedRequest, ErrorEntry, TestRequest};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

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

    fn request(id: u64) -> TestRequest {
        TestRequest {
            id,
            class: "Suite".to_string(),
            name: format!("test_{id}"),
        }
    }

    #[test]
    fn test_only_problems_are_printed() {
        let sink = Shared::default();
        let mut reporter = NoiselessReporter::new(Box::new(sink.clone()));
        let worker = WorkerInfo::new(1);

        reporter.begin(2, 4);
        reporter.test_completed(&worker, &TestResult::pass(&request(1), Duration::ZERO));
        reporter.test_completed(
            &worker,
            &TestResult::pass(&request(2), Duration::ZERO)
                .with_error(ErrorEntry::failure("expected 1\ngot 2")),
        );
        reporter.on_exit(&worker, Some(0));
        reporter.on_exit(&WorkerInfo::new(0), Some(139));

        let mut summary = RunSummary::new(2, 4);
        summary.executed_tests = 2;
        summary.failed_tests = 1;
        summary.abandoned.push(AbandonedRequest {
            lane: 0,
            request: request(3),
            exit_code: Some(139),
        });
        reporter.end(&summary);

        let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[..5],
            [
                "[F] Suite::test_2 (WorkerB)",
                "    failure: expected 1",
                "      got 2",
                "[!] WorkerA exited with status 139",
                "[!] Suite::test_3 abandoned when WorkerA exited",
            ]
        );
        assert!(lines[5].starts_with("FAILED 50.0% passed | Executed: 2/4"));
        assert_eq!(lines.len(), 6);
        assert!(!text.contains("test_1"));
    }

    #[test]
    fn test_clean_run_prints_verdict_only() {
        let sink = Shared::default();
        let mut reporter = NoiselessReporter::new(Box::new(sink.clone()));
        let worker = WorkerInfo::new(0);

        reporter.begin(1, 1);
        reporter.test_completed(&worker, &TestResult::pass(&request(1), Duration::ZERO));
        let mut summary = RunSummary::new(1, 1);
        summary.executed_tests = 1;
        reporter.end(&summary);

        let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(text.starts_with("OK 100.0% passed | Executed: 1/1"));
        assert_eq!(text.lines().count(), 1);
    }
}
