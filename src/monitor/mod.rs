//! Progress monitors. A job uses exactly one of them.

mod poll;
mod stream;

pub use poll::{FolderPollMonitor, count_with_extension};
pub(crate) use poll::has_extension;
pub use stream::StreamMarkerMonitor;

/// Which pipe of the child a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    fn index(self) -> usize {
        match self {
            OutputStream::Stdout => 0,
            OutputStream::Stderr => 1,
        }
    }
}

/// Source of completed-unit samples for one job.
#[derive(Debug)]
pub enum ProgressMonitor {
    StreamMarker(StreamMarkerMonitor),
    FolderPoll(FolderPollMonitor),
}

impl ProgressMonitor {
    /// Routes output bytes. Only the stream strategy looks at them.
    pub fn on_bytes(&mut self, stream: OutputStream, chunk: &[u8]) -> Option<usize> {
        match self {
            ProgressMonitor::StreamMarker(m) => m.on_bytes(stream, chunk),
            ProgressMonitor::FolderPoll(_) => None,
        }
    }

    /// Timer tick. Only the polling strategy samples on it.
    pub fn tick(&mut self) -> Option<usize> {
        match self {
            ProgressMonitor::StreamMarker(_) => None,
            ProgressMonitor::FolderPoll(m) => m.tick(),
        }
    }

    /// Last look after the process exited.
    pub fn drain(&mut self) -> Option<usize> {
        match self {
            ProgressMonitor::StreamMarker(m) => m.drain(),
            ProgressMonitor::FolderPoll(m) => m.tick(),
        }
    }

    pub fn completed(&self) -> usize {
        match self {
            ProgressMonitor::StreamMarker(m) => m.completed(),
            ProgressMonitor::FolderPoll(m) => m.completed(),
        }
    }

    pub fn needs_ticks(&self) -> bool {
        matches!(self, ProgressMonitor::FolderPoll(_))
    }
}
