use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, TestResult};
use crate::protocol::encode_result;

/// Writes every completed result to `<dir>/<label>.log`, one file per lane.
///
/// The files use the result line format, so each can be fed back with
/// `--replay <dir>/<label>.log`.
pub struct ReplayLogRecorder {
    dir: PathBuf,
    files: HashMap<usize, BufWriter<File>>,
    failed_lanes: Vec<usize>,
}

impl ReplayLogRecorder {
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            files: HashMap::new(),
            failed_lanes: Vec::new(),
        })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn append(&mut self, worker: &WorkerInfo, line: &str) -> io::Result<()> {
        if !self.files.contains_key(&worker.lane) {
            let path = self.dir.join(format!("{}.log", worker.label));
            debug!("Recording {} to {}", worker, path.display());
            self.files
                .insert(worker.lane, BufWriter::new(File::create(path)?));
        }
        match self.files.get_mut(&worker.lane) {
            Some(file) => file.write_all(line.as_bytes()),
            None => Ok(()),
        }
    }
}

impl TestEventListener for ReplayLogRecorder {
    fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        if self.failed_lanes.contains(&worker.lane) {
            return;
        }
        if let Err(e) = self.append(worker, &encode_result(result)) {
            warn!("Stopped recording {}: {}", worker, e);
            self.failed_lanes.push(worker.lane);
            self.files.remove(&worker.lane);
        }
    }

    fn end(&mut self, _summary: &RunSummary) {
        for (lane, file) in &mut self.files {
            if let Err(e) = file.flush() {
                warn!("Failed to flush replay log for lane {}: {}", lane, e);
            }
        }
    }
}
