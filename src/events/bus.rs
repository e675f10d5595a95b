//! In-process fan-out of lifecycle events.

use tracing::trace;

use super::listener::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, TestRequest, TestResult};

/// Fixed set of subscribers.
///
/// The set is captured when the bus is built, before the run starts; there
/// is no way to subscribe while events are flowing.
pub struct EventBus {
    listeners: Vec<Box<dyn TestEventListener>>,
}

impl EventBus {
    pub fn new(listeners: Vec<Box<dyn TestEventListener>>) -> Self {
        Self { listeners }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn begin(&mut self, worker_count: usize, expected_tests: usize) {
        trace!(worker_count, expected_tests, "begin");
        for listener in &mut self.listeners {
            listener.begin(worker_count, expected_tests);
        }
    }

    pub fn test_started(&mut self, worker: &WorkerInfo, request: &TestRequest) {
        for listener in &mut self.listeners {
            listener.test_started(worker, request);
        }
    }

    pub fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        for listener in &mut self.listeners {
            listener.test_completed(worker, result);
        }
    }

    pub fn end(&mut self, summary: &RunSummary) {
        trace!(executed = summary.executed_tests, "end");
        for listener in &mut self.listeners {
            listener.end(summary);
        }
    }

    pub fn stdout(&mut self, worker: &WorkerInfo, data: &[u8]) {
        for listener in &mut self.listeners {
            listener.on_stdout(worker, data);
        }
    }

    pub fn stderr(&mut self, worker: &WorkerInfo, data: &[u8]) {
        for listener in &mut self.listeners {
            listener.on_stderr(worker, data);
        }
    }

    pub fn exit(&mut self, worker: &WorkerInfo, exit_code: Option<i32>) {
        for listener in &mut self.listeners {
            listener.on_exit(worker, exit_code);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Recorded, Recorder};
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fan_out_reaches_every_listener() {
        let first = Recorder::new();
        let second = Recorder::new();
        let mut bus = EventBus::new(vec![Box::new(first.clone()), Box::new(second.clone())]);
        assert_eq!(bus.len(), 2);

        let worker = WorkerInfo::new(1);
        let request = TestRequest {
            id: 4,
            class: "A".to_string(),
            name: "b".to_string(),
        };
        let result = TestResult::pass(&request, Duration::ZERO);

        bus.begin(2, 1);
        bus.test_started(&worker, &request);
        bus.test_completed(&worker, &result);
        bus.exit(&worker, Some(0));
        let mut summary = RunSummary::new(2, 1);
        summary.executed_tests = 1;
        bus.end(&summary);

        let expected = vec![
            Recorded::Begin(2, 1),
            Recorded::Started(1, 4),
            Recorded::Completed(1, 4),
            Recorded::Exit(1, Some(0)),
            Recorded::End(1),
        ];
        assert_eq!(first.events(), expected);
        assert_eq!(second.events(), expected);
    }

    #[test]
    fn test_empty_bus() {
        let mut bus = EventBus::new(Vec::new());
        assert!(bus.is_empty());
        bus.begin(1, 0);
        bus.end(&RunSummary::new(1, 0));
    }
}
