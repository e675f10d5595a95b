//! Policy listeners
//!
//! Subscribers that act on outcomes instead of displaying them.

mod exit_status;
mod replay_log;
mod stop_on_error;

pub use exit_status::{ExitStatus, ExitStatusListener};
pub use replay_log::ReplayLogRecorder;
pub use stop_on_error::StopOnErrorListener;
