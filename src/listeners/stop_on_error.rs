use tracing::info;

use crate::distributor::CancelHandle;
use crate::events::{TestEventListener, WorkerInfo};
use crate::models::TestResult;

/// Cancels the run at the first failure or error. Warnings never cancel.
pub struct StopOnErrorListener {
    cancel: CancelHandle,
}

impl StopOnErrorListener {
    pub fn new(cancel: CancelHandle) -> Self {
        Self { cancel }
    }
}

impl TestEventListener for StopOnErrorListener {
    fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        if result.is_failed() && !self.cancel.is_cancelled() {
            info!("Stopping after {} failed on {}", result.qualified_name(), worker);
            self.cancel.cancel();
        }
    }
}
