//! Test distribution engine
//!
//! Assigns tests to worker lanes, tracks in-flight requests and drives
//! shutdown. Replay logs go through the same listener pipeline.

mod cancel;
mod replay;
mod scheduler;

pub use cancel::CancelHandle;
pub use replay::ReplayLog;
pub use scheduler::{Distributor, DistributorConfig, TestSource, DEFAULT_SHUTDOWN_GRACE};
