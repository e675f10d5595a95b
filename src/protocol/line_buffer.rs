//! Chunk-to-line reassembly for the result channel.

/// Default initial capacity for the pending buffer (4KB).
const DEFAULT_CAPACITY: usize = 4 * 1024;

/// Accumulates raw bytes and yields complete lines.
///
/// Lines are returned in arrival order, each exactly once, no matter how the
/// transport chunks the stream. The trailing `\n` (and a preceding `\r`) is
/// stripped.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Append a chunk and drain every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(self.take_line());
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        lines
    }

    /// Flush an unterminated final line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    /// Bytes buffered without a terminating newline yet.
    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take_line(&mut self) -> String {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
