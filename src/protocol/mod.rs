//! Line protocol shared by the coordinator and its workers
//!
//! Requests travel on a worker's stdin, results on its dedicated result
//! channel. Both directions are newline-delimited JSON.

mod codec;
mod line_buffer;

pub use codec::{
    decode_command, decode_result, encode_exit, encode_request, encode_result, WorkerCommand,
};
pub use line_buffer::LineBuffer;

/// File descriptor number of the result channel inside a worker process.
pub const RESULT_FD: i32 = 3;

/// Environment variable telling a worker where its result channel is.
pub const RESULT_FD_ENV: &str = "TESTLANE_RESULT_FD";
