//! Coordinator-side handle for one worker lane.

use std::fmt;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::WorkerInfo;
use crate::models::{TestRequest, TestResult};
use crate::protocol::{decode_result, encode_exit, encode_request, LineBuffer};
use crate::transport::{LaneEvent, WorkerProcess, WorkerSpec};

/// Lifecycle of a worker lane
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerState {
    Starting,
    Idle,
    Busy(TestRequest),
    Exited(Option<i32>),
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Starting => write!(f, "starting"),
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Busy(request) => write!(f, "busy ({request})"),
            WorkerState::Exited(Some(code)) => write!(f, "exited ({code})"),
            WorkerState::Exited(None) => write!(f, "exited"),
        }
    }
}

/// One worker process plus the line reader over its result channel.
///
/// Holds at most one outstanding request at a time.
pub struct WorkerHandle {
    info: WorkerInfo,
    process: WorkerProcess,
    state: WorkerState,
    results: LineBuffer,
    completed: usize,
}

impl WorkerHandle {
    /// Spawn the worker process for `lane`.
    pub fn start(
        spec: &WorkerSpec,
        lane: usize,
        events: mpsc::UnboundedSender<LaneEvent>,
    ) -> Result<Self> {
        let process = WorkerProcess::start(spec, lane, events)?;
        Ok(Self {
            info: WorkerInfo::new(lane),
            process,
            state: WorkerState::Starting,
            results: LineBuffer::new(),
            completed: 0,
        })
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    pub fn lane(&self) -> usize {
        self.info.lane
    }

    #[cfg(test)]
    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    #[cfg(test)]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// The worker is running and can accept work.
    pub fn mark_ready(&mut self) {
        if self.state == WorkerState::Starting {
            self.state = WorkerState::Idle;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == WorkerState::Idle
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, WorkerState::Busy(_))
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.state, WorkerState::Exited(_))
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> Option<&TestRequest> {
        match &self.state {
            WorkerState::Busy(request) => Some(request),
            _ => None,
        }
    }

    /// Send a request to an idle worker and mark it busy.
    ///
    /// On a write error the worker stays busy: its process is gone or going,
    /// and the exit event will abandon the request.
    pub async fn dispatch(&mut self, request: TestRequest) -> io::Result<()> {
        debug_assert!(self.is_idle(), "dispatch to a worker that is {}", self.state);
        let line = encode_request(&request);
        self.state = WorkerState::Busy(request);
        self.process.write(line.as_bytes()).await
    }

    /// Feed a chunk from the result channel; returns the results it completes.
    pub fn on_result_chunk(&mut self, chunk: &[u8]) -> Vec<TestResult> {
        self.results
            .push(chunk)
            .iter()
            .filter_map(|line| decode_result(line))
            .collect()
    }

    /// Decode an unterminated final line, if the stream ended mid-line.
    pub fn finish_results(&mut self) -> Option<TestResult> {
        self.results
            .finish()
            .and_then(|line| decode_result(&line))
    }

    /// Resolve the in-flight request with `result`.
    ///
    /// Returns false, leaving the state untouched, if the result does not
    /// answer the outstanding request.
    pub fn resolve(&mut self, result: &TestResult) -> bool {
        match &self.state {
            WorkerState::Busy(request) if request.id == result.id => {
                self.state = WorkerState::Idle;
                self.completed += 1;
                true
            }
            state => {
                warn!(
                    lane = self.info.lane,
                    "Ignoring result for #{} while {}", result.id, state
                );
                false
            }
        }
    }

    /// Record the process exit; returns the request it abandoned, if any.
    pub fn mark_exited(&mut self, exit_code: Option<i32>) -> Option<TestRequest> {
        let previous = std::mem::replace(&mut self.state, WorkerState::Exited(exit_code));
        debug!(
            lane = self.info.lane,
            "{} exited after {} test(s)", self.info, self.completed
        );
        match previous {
            WorkerState::Busy(request) => Some(request),
            _ => None,
        }
    }

    /// Ask the worker to finish: termination marker, then close stdin.
    ///
    /// A worker still running after `grace` is killed.
    pub async fn shutdown(&mut self, grace: Duration) {
        if self.is_exited() || !self.process.is_input_open() {
            return;
        }
        if let Err(e) = self.process.write(encode_exit().as_bytes()).await {
            debug!(lane = self.info.lane, "Could not send exit marker: {}", e);
        }
        self.process.close(grace);
    }

    /// Forcibly terminate the worker.
    #[cfg(test)]
    pub fn kill(&mut self) {
        if !self.is_exited() {
            warn!(lane = self.info.lane, "Killing {} ({})", self.info, self.state);
            self.process.kill();
        }
    }
}
