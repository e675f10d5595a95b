//! Newline-delimited JSON event stream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tracing::debug;

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, TestRequest, TestResult};

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Begin {
        workers: usize,
        tests: usize,
        started_at: DateTime<Utc>,
    },
    TestStarted {
        worker: &'a str,
        request: &'a TestRequest,
    },
    TestCompleted {
        worker: &'a str,
        result: &'a TestResult,
    },
    Exit {
        worker: &'a str,
        code: Option<i32>,
    },
    End {
        summary: &'a RunSummary,
    },
}

pub struct JsonReporter {
    sink: Box<dyn Write + Send>,
}

impl JsonReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }

    fn emit(&mut self, event: &JsonEvent<'_>) {
        let written = serde_json::to_writer(&mut self.sink, event)
            .map_err(std::io::Error::from)
            .and_then(|()| self.sink.write_all(b"\n"));
        if let Err(e) = written {
            debug!("JSON reporter write failed: {}", e);
        }
    }
}

impl TestEventListener for JsonReporter {
    fn begin(&mut self, worker_count: usize, expected_tests: usize) {
        self.emit(&JsonEvent::Begin {
            workers: worker_count,
            tests: expected_tests,
            started_at: Utc::now(),
        });
    }

    fn test_started(&mut self, worker: &WorkerInfo, request: &TestRequest) {
        self.emit(&JsonEvent::TestStarted {
            worker: &worker.label,
            request,
        });
    }

    fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        self.emit(&JsonEvent::TestCompleted {
            worker: &worker.label,
            result,
        });
    }

    fn on_exit(&mut self, worker: &WorkerInfo, exit_code: Option<i32>) {
        self.emit(&JsonEvent::Exit {
            worker: &worker.label,
            code: exit_code,
        });
    }

    fn end(&mut self, summary: &RunSummary) {
        self.emit(&JsonEvent::End { summary });
        if let Err(e) = self.sink.flush() {
            debug!("JSON reporter flush failed: {}", e);
        }
    }
}
