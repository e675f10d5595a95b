//! Recorded result logs fed back through the listener pipeline.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RunnerError};
use crate::models::TestResult;
use crate::protocol::decode_result;

/// One lane's recorded results, in file order.
#[derive(Debug, Clone)]
pub struct ReplayLog {
    path: PathBuf,
    label: String,
    results: Vec<TestResult>,
}

impl ReplayLog {
    /// Read a replay log. Lines that do not decode are skipped.
    pub fn open(path: impl AsRef<Path>, label: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RunnerError::Replay {
            path: path.display().to_string(),
            source,
        })?;

        let results: Vec<TestResult> = content.lines().filter_map(decode_result).collect();
        debug!("Loaded {} record(s) from {}", results.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            label: label.into(),
            results,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
