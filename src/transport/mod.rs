//! Multiplexed process transport
//!
//! Owns one child process per worker and forwards its four byte streams to
//! the coordinator as `LaneEvent`s.

mod process;
mod spawn;

pub use process::{LaneEvent, LaneEventKind, WorkerProcess};
pub use spawn::{generate_token, WorkerSpec};
