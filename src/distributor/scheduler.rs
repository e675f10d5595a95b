//! Greedy FIFO distribution of tests over a pool of worker lanes.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::cancel::CancelHandle;
use super::replay::ReplayLog;
use crate::error::{Result, RunnerError};
use crate::events::{EventBus, TestEventListener, WorkerInfo};
use crate::models::{AbandonedRequest, RunSummary, TestRequest, TestResult, TestUnit};
use crate::transport::{LaneEvent, LaneEventKind, WorkerSpec};
use crate::utils::timer::Timer;
use crate::worker::WorkerHandle;

/// Default time a worker gets to exit after its input is closed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Where the run's results come from.
#[derive(Debug)]
pub enum TestSource {
    /// Run these units on live workers, in this order.
    Live(Vec<TestUnit>),
    /// Re-emit a recorded lane without spawning anything.
    Replay(ReplayLog),
}

impl TestSource {
    pub fn len(&self) -> usize {
        match self {
            TestSource::Live(units) => units.len(),
            TestSource::Replay(log) => log.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TestSource::Live(units) => units.is_empty(),
            TestSource::Replay(log) => log.is_empty(),
        }
    }
}

/// Distributor configuration
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    pub spec: WorkerSpec,
    pub shutdown_grace: Duration,
}

impl DistributorConfig {
    pub fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Owns the worker pool and the pending queue for one run.
pub struct Distributor {
    source: TestSource,
    config: DistributorConfig,
    listeners: Vec<Box<dyn TestEventListener>>,
    cancel: CancelHandle,
}

/// Mutable state of a live run, owned by the coordinator task.
struct RunState {
    queue: VecDeque<TestRequest>,
    workers: Vec<WorkerHandle>,
    summary: RunSummary,
    shutting_down: bool,
}

impl RunState {
    fn any_busy(&self) -> bool {
        self.workers.iter().any(WorkerHandle::is_busy)
    }

    fn all_exited(&self) -> bool {
        self.workers.iter().all(WorkerHandle::is_exited)
    }
}

impl Distributor {
    pub fn new(source: TestSource, config: DistributorConfig) -> Self {
        Self {
            source,
            config,
            listeners: Vec::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Subscribe a listener. The set is fixed once `run` starts.
    pub fn add_listener(&mut self, listener: Box<dyn TestEventListener>) {
        self.listeners.push(listener);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run every test to completion, cancellation or worker loss.
    ///
    /// `end` reaches the listeners before this returns, on success and on
    /// `AllWorkersExited` alike.
    pub async fn run(self, worker_count: usize) -> Result<RunSummary> {
        let Distributor {
            source,
            config,
            listeners,
            cancel,
        } = self;
        let mut bus = EventBus::new(listeners);

        match source {
            TestSource::Live(units) => {
                run_live(units, worker_count, &config, &mut bus, &cancel).await
            }
            TestSource::Replay(log) => Ok(run_replay(log, &mut bus, &cancel)),
        }
    }
}

async fn run_live(
    units: Vec<TestUnit>,
    worker_count: usize,
    config: &DistributorConfig,
    bus: &mut EventBus,
    cancel: &CancelHandle,
) -> Result<RunSummary> {
    if worker_count == 0 {
        return Err(RunnerError::NoWorkers);
    }

    let timer = Timer::start("run");
    let (tx, mut rx) = mpsc::unbounded_channel::<LaneEvent>();

    let mut workers = Vec::with_capacity(worker_count);
    for lane in 0..worker_count {
        workers.push(WorkerHandle::start(&config.spec, lane, tx.clone())?);
    }
    // Only the transports hold senders now; the channel closes after the last exit
    drop(tx);

    let queue: VecDeque<TestRequest> = units.into_iter().map(TestRequest::from).collect();
    let mut state = RunState {
        summary: RunSummary::new(worker_count, queue.len()),
        queue,
        workers,
        shutting_down: false,
    };

    info!(
        "Running {} test(s) on {} worker(s)",
        state.summary.expected_tests, worker_count
    );
    bus.begin(worker_count, state.summary.expected_tests);

    for worker in &mut state.workers {
        worker.mark_ready();
    }
    dispatch_idle(&mut state, bus, cancel).await;

    let mut cancel_seen = false;
    let mut interrupts_armed = true;
    loop {
        let drained = state.queue.is_empty() && !state.any_busy();
        if !state.shutting_down && (drained || cancel.is_cancelled()) {
            begin_shutdown(&mut state, config.shutdown_grace).await;
        }
        if state.all_exited() {
            break;
        }

        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    on_lane_event(&mut state, bus, event);
                    dispatch_idle(&mut state, bus, cancel).await;
                }
                None => break,
            },
            _ = cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
                info!("Cancelled; {} test(s) will not be dispatched", state.queue.len());
            }
            signal = tokio::signal::ctrl_c(), if !cancel_seen && interrupts_armed => {
                interrupts_armed = on_interrupt(signal, cancel);
            }
        }
    }

    let mut summary = state.summary;
    summary.cancelled = cancel.is_cancelled();
    summary.elapsed = timer.stop();

    let pending = state.queue.len();
    if pending > 0 && !summary.cancelled {
        error!("Every worker exited with {} test(s) pending", pending);
        bus.end(&summary);
        return Err(RunnerError::AllWorkersExited { pending });
    }

    info!("{}", summary);
    bus.end(&summary);
    Ok(summary)
}

/// React to Ctrl-C. Returns whether the signal listener stays armed; a
/// failed registration disarms it without cancelling the run.
fn on_interrupt(signal: std::io::Result<()>, cancel: &CancelHandle) -> bool {
    match signal {
        Ok(()) => {
            warn!("Interrupted; waiting for running tests to finish");
            cancel.cancel();
            true
        }
        Err(e) => {
            warn!("Cannot listen for Ctrl-C: {}", e);
            false
        }
    }
}

/// Hand the queue head to every idle worker, in lane order.
async fn dispatch_idle(state: &mut RunState, bus: &mut EventBus, cancel: &CancelHandle) {
    if state.shutting_down {
        return;
    }
    for worker in &mut state.workers {
        if cancel.is_cancelled() || state.queue.is_empty() {
            return;
        }
        if !worker.is_idle() {
            continue;
        }
        let Some(request) = state.queue.pop_front() else {
            return;
        };

        debug!(lane = worker.lane(), "Dispatching {}", request);
        state.summary.dispatched_tests += 1;
        bus.test_started(worker.info(), &request);
        if let Err(e) = worker.dispatch(request).await {
            warn!("Failed to send test to {}: {}", worker.info(), e);
        }
    }
}

/// Send the exit marker to every live worker and start their grace period.
async fn begin_shutdown(state: &mut RunState, grace: Duration) {
    debug!("Shutting down workers (grace {:?})", grace);
    state.shutting_down = true;
    for worker in &mut state.workers {
        worker.shutdown(grace).await;
    }
}

fn on_lane_event(state: &mut RunState, bus: &mut EventBus, event: LaneEvent) {
    let Some(worker) = state.workers.get_mut(event.lane) else {
        warn!("Event from unknown lane {}", event.lane);
        return;
    };

    match event.kind {
        LaneEventKind::Stdout(bytes) => bus.stdout(worker.info(), &bytes),
        LaneEventKind::Stderr(bytes) => bus.stderr(worker.info(), &bytes),
        LaneEventKind::Result(chunk) => {
            for result in worker.on_result_chunk(&chunk) {
                complete(worker, &mut state.summary, bus, result);
            }
        }
        LaneEventKind::Exit(code) => {
            if let Some(result) = worker.finish_results() {
                complete(worker, &mut state.summary, bus, result);
            }

            let abandoned = worker.mark_exited(code);
            bus.exit(worker.info(), code);

            match abandoned {
                Some(request) => {
                    warn!(
                        "{} exited ({:?}) while running {}; not retried",
                        worker.info(),
                        code,
                        request
                    );
                    state.summary.abandoned.push(AbandonedRequest {
                        lane: worker.lane(),
                        request,
                        exit_code: code,
                    });
                }
                None if !state.shutting_down => {
                    warn!("{} exited unexpectedly ({:?})", worker.info(), code);
                }
                None => debug!("{} exited ({:?})", worker.info(), code),
            }
        }
    }
}

fn complete(
    worker: &mut WorkerHandle,
    summary: &mut RunSummary,
    bus: &mut EventBus,
    result: TestResult,
) {
    if !worker.resolve(&result) {
        return;
    }
    summary.executed_tests += 1;
    if result.is_failed() {
        summary.failed_tests += 1;
    }
    bus.test_completed(worker.info(), &result);
}

/// Emit a recorded lane as if it had just run.
fn run_replay(log: ReplayLog, bus: &mut EventBus, cancel: &CancelHandle) -> RunSummary {
    let timer = Timer::start("replay");
    let worker = WorkerInfo::with_label(0, log.label());
    let mut summary = RunSummary::new(1, log.len());

    info!(
        "Replaying {} record(s) from {} as {}",
        log.len(),
        log.path().display(),
        worker
    );
    bus.begin(1, log.len());

    for result in log.results() {
        if cancel.is_cancelled() {
            break;
        }
        let request = result.to_request();
        summary.dispatched_tests += 1;
        bus.test_started(&worker, &request);

        summary.executed_tests += 1;
        if result.is_failed() {
            summary.failed_tests += 1;
        }
        bus.test_completed(&worker, result);
    }

    summary.cancelled = cancel.is_cancelled();
    summary.elapsed = timer.stop();
    bus.end(&summary);
    summary
}
