//! Progress from sentinel lines on the job's merged output.
//!
//! The kernel prints one line starting with [`SENTINEL`] per finished unit.
//! Chunks arrive at arbitrary byte boundaries, so each stream keeps its own
//! unterminated tail until the next newline shows up.

use super::OutputStream;

/// Token that opens a progress line.
pub const SENTINEL: &str = "PROGRESS";

// Longest unterminated tail kept per stream. Only the start of a line decides
// whether it is a sentinel, so the rest of an overlong line is dropped.
const MAX_TAIL: usize = 4096;

/// Counts sentinel lines across chunk boundaries.
#[derive(Debug, Default)]
pub struct StreamMarkerMonitor {
    completed: usize,
    // Unterminated tail per stream, indexed by `OutputStream::index`.
    pending: [Vec<u8>; 2],
}

impl StreamMarkerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Feeds one chunk. Returns the new count if at least one sentinel was seen.
    pub fn on_bytes(&mut self, stream: OutputStream, chunk: &[u8]) -> Option<usize> {
        let before = self.completed;
        let pending = &mut self.pending[stream.index()];
        pending.extend_from_slice(chunk);

        let found = match pending.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let rest = pending.split_off(last_newline + 1);
                let complete = std::mem::replace(pending, rest);
                complete
                    .split(|&b| b == b'\n')
                    .filter(|line| is_sentinel(line))
                    .count()
            }
            None => 0,
        };
        pending.truncate(MAX_TAIL);
        self.completed += found;

        (self.completed > before).then_some(self.completed)
    }

    /// Scans whatever is left unterminated. Called once the process has exited.
    pub fn drain(&mut self) -> Option<usize> {
        let before = self.completed;
        for pending in &mut self.pending {
            let tail = std::mem::take(pending);
            if is_sentinel(&tail) {
                self.completed += 1;
            }
        }
        (self.completed > before).then_some(self.completed)
    }
}

// Invalid UTF-8 sequences are skipped, not substituted.
fn is_sentinel(line: &[u8]) -> bool {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let decoded: String = line.utf8_chunks().map(|chunk| chunk.valid()).collect();
    decoded.starts_with(SENTINEL)
}
