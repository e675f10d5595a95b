//! Worker lanes
//!
//! `WorkerHandle` is the coordinator's view of one lane; `worker_main` is
//! what runs on the other end of the pipes.

mod executor;
mod handle;
pub mod worker_main;

pub use handle::WorkerHandle;
