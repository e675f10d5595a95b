use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, TestResult};

/// Process exit status accumulated over a run.
///
/// Shared between the listener inside the distributor and the caller that
/// exits the process afterwards.
#[derive(Clone, Debug, Default)]
pub struct ExitStatus {
    failed: Arc<AtomicBool>,
}

impl ExitStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// `1` if any test failed or was abandoned, `0` otherwise.
    pub fn code(&self) -> i32 {
        if self.is_failed() {
            1
        } else {
            0
        }
    }
}

/// Records failures and errors; warnings do not count.
pub struct ExitStatusListener {
    status: ExitStatus,
}

impl ExitStatusListener {
    pub fn new(status: ExitStatus) -> Self {
        Self { status }
    }
}

impl TestEventListener for ExitStatusListener {
    fn test_completed(&mut self, _worker: &WorkerInfo, result: &TestResult) {
        if result.is_failed() {
            self.status.mark_failed();
        }
    }

    fn end(&mut self, summary: &RunSummary) {
        // A test lost with its worker never passed
        if !summary.abandoned.is_empty() {
            debug!("{} abandoned test(s) fail the run", summary.abandoned.len());
            self.status.mark_failed();
        }
    }
}
