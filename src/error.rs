//! Error types for the distributor and its transport.

use thiserror::Error;

/// Infrastructure failures that abort a run.
///
/// Test failures are never reported through this type; they travel as
/// `ErrorEntry` values inside results.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn worker {lane}: {source}")]
    Spawn {
        lane: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open result channel: {0}")]
    Pipe(#[from] nix::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read replay log {path}: {source}")]
    Replay {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid writer '{0}'. Writers must be in the format format:filename")]
    WriterSpec(String),

    #[error("Unknown formatter '{0}'. Valid options: lane, tap, json, xunit, noiseless")]
    UnknownFormatter(String),

    #[error("At least one worker is required")]
    NoWorkers,

    #[error("All workers exited with {pending} test(s) still pending")]
    AllWorkersExited { pending: usize },
}

/// Errors decoding coordinator commands on the worker side
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed command line: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Empty command line")]
    Empty,
}

/// Result type alias for distributor operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
