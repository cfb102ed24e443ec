//! Terminal session types and error definitions.

use thiserror::Error;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub rows: u16,
    pub cols: u16,
}

impl TermSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl std::fmt::Display for TermSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Errors that can occur while running a terminal session.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The pty could not be allocated or the shell could not be spawned.
    #[error("failed to start process: {0}")]
    ProcessStart(String),

    /// Resizing the pty failed.
    #[error("failed to resize pty to {size}: {reason}")]
    Resize { size: TermSize, reason: String },
}

/// Why a terminal session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection (or sent a close frame).
    ClientClosed,
    /// The pty reached EOF or failed: the process exited.
    ProcessExited,
    /// A read or write on the connection failed.
    ConnectionFailed(String),
}
