//! Interactive process adapter.
//!
//! The bridge never builds a pty itself. It asks a [`ProcessLauncher`] for a
//! [`ProcessIo`]: a blocking reader and writer over the pty master plus a
//! [`PtyControl`] handle for resize and termination. [`ShellLauncher`] is the
//! real implementation on top of `portable-pty`.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::config::TerminalConfig;
use crate::terminal::types::{TermSize, TerminalError};

/// Out-of-band operations on a running pty process.
pub trait PtyControl: Send + Sync {
    /// Apply a new window size to the pty.
    fn resize(&self, size: TermSize) -> Result<(), TerminalError>;

    /// Kill and reap the process. Must be idempotent.
    fn terminate(&self);
}

/// Handles for one spawned process.
pub struct ProcessIo {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub control: Arc<dyn PtyControl>,
}

/// Starts interactive processes attached to a pty.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, size: TermSize) -> Result<ProcessIo, TerminalError>;
}

/// Launches the configured shell in a native pty.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    shell: String,
    term: String,
}

impl ShellLauncher {
    pub fn new(config: &TerminalConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            term: config.term.clone(),
        }
    }
}

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, size: TermSize) -> Result<ProcessIo, TerminalError> {
        let pair = native_pty_system()
            .openpty(pty_size(size))
            .map_err(start_error)?;

        let mut cmd = CommandBuilder::new(&self.shell);
        cmd.env("TERM", &self.term);

        let child = pair.slave.spawn_command(cmd).map_err(start_error)?;
        // Only the child holds the slave side now, so its exit yields EOF on the reader.
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(start_error)?;
        let writer = pair.master.take_writer().map_err(start_error)?;

        tracing::debug!(
            shell = %self.shell,
            pid = ?child.process_id(),
            size = %size,
            "Shell spawned"
        );

        Ok(ProcessIo {
            reader,
            writer,
            control: Arc::new(PtyProcess {
                master: Mutex::new(pair.master),
                child: Mutex::new(child),
            }),
        })
    }
}

/// Control handle over a native pty and its child.
struct PtyProcess {
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
}

impl PtyControl for PtyProcess {
    fn resize(&self, size: TermSize) -> Result<(), TerminalError> {
        let master = self.master.lock().map_err(|e| TerminalError::Resize {
            size,
            reason: e.to_string(),
        })?;
        master.resize(pty_size(size)).map_err(|e| TerminalError::Resize {
            size,
            reason: e.to_string(),
        })
    }

    fn terminate(&self) {
        let Ok(mut child) = self.child.lock() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        if let Err(e) = child.kill() {
            tracing::debug!(error = %e, "Kill failed, process likely already exited");
        }
        match child.wait() {
            Ok(status) => tracing::debug!(status = ?status, "Shell reaped"),
            Err(e) => tracing::warn!(error = %e, "Failed to reap shell"),
        }
    }
}

fn pty_size(size: TermSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn start_error<E: std::fmt::Display>(error: E) -> TerminalError {
    TerminalError::ProcessStart(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_shell_is_a_start_error() {
        let launcher = ShellLauncher {
            shell: "/nonexistent/definitely-not-a-shell".into(),
            term: "xterm-256color".into(),
        };
        match launcher.launch(TermSize::new(24, 80)) {
            Err(TerminalError::ProcessStart(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(io) => {
                io.control.terminate();
                panic!("spawning a missing shell should fail");
            }
        }
    }
}
