//! Line codec for coordinator/worker messages.
//!
//! Every message is a single JSON object followed by `\n`. serde_json escapes
//! control characters inside strings, so an encoded message never contains an
//! embedded newline.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProtocolError;
use crate::models::{TestRequest, TestResult};

/// Message sent from the coordinator to a worker's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Execute one test
    Run(TestRequest),
    /// Finish and exit
    Exit,
}

impl WorkerCommand {
    /// Serialize to a JSON line (with newline).
    pub fn to_line(&self) -> String {
        let mut json = serde_json::to_string(self).expect("WorkerCommand serialization failed");
        json.push('\n');
        json
    }
}

/// Encode a test request for a worker's stdin.
pub fn encode_request(request: &TestRequest) -> String {
    WorkerCommand::Run(request.clone()).to_line()
}

/// Encode the termination marker.
pub fn encode_exit() -> String {
    WorkerCommand::Exit.to_line()
}

/// Decode one line read from stdin in worker mode.
pub fn decode_command(line: &str) -> Result<WorkerCommand, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Encode a result for the result channel or a replay log.
pub fn encode_result(result: &TestResult) -> String {
    let mut json = serde_json::to_string(result).expect("TestResult serialization failed");
    json.push('\n');
    json
}

/// Decode one line from a result channel.
///
/// Blank lines and lines that are not well-formed results yield `None`.
/// A bad line is logged and skipped; it never aborts the run.
pub fn decode_result(line: &str) -> Option<TestResult> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("Dropping malformed result line ({}): {:.120}", e, line);
            None
        }
    }
}
