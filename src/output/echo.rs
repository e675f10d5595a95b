use std::io::{self, Write};

use crate::events::{TestEventListener, WorkerInfo};

/// Copies worker diagnostics to this process's stderr, byte for byte.
///
/// Stdout of the workers is only copied when asked for, since reporters own
/// our own stdout.
pub struct StreamEcho<W: Write + Send = io::Stderr> {
    sink: W,
    include_stdout: bool,
}

impl StreamEcho {
    pub fn stderr(include_stdout: bool) -> Self {
        Self::new(io::stderr(), include_stdout)
    }
}

impl<W: Write + Send> StreamEcho<W> {
    pub fn new(sink: W, include_stdout: bool) -> Self {
        Self {
            sink,
            include_stdout,
        }
    }

    fn copy(&mut self, data: &[u8]) {
        // Diagnostics are best effort
        let _ = self.sink.write_all(data);
        let _ = self.sink.flush();
    }
}

impl<W: Write + Send> TestEventListener for StreamEcho<W> {
    fn on_stdout(&mut self, _worker: &WorkerInfo, data: &[u8]) {
        if self.include_stdout {
            self.copy(data);
        }
    }

    fn on_stderr(&mut self, _worker: &WorkerInfo, data: &[u8]) {
        self.copy(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_is_opt_in() {
        let worker = WorkerInfo::new(0);

        let mut quiet = StreamEcho::new(Vec::new(), false);
        quiet.on_stdout(&worker, b"out\n");
        quiet.on_stderr(&worker, b"err\n");
        assert_eq!(quiet.sink, b"err\n");

        let mut loud = StreamEcho::new(Vec::new(), true);
        loud.on_stdout(&worker, b"out\n");
        loud.on_stderr(&worker, b"err\n");
        assert_eq!(loud.sink, b"out\nerr\n");
    }
}
