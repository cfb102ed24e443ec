//! Terminal bridge: one pty process relayed over one duplex connection.
//!
//! # Data Flow
//! ```text
//! connection ──▶ inbound loop ──decode──▶ resize ─▶ PtyControl
//!                                  └────▶ input ─▶ writer thread ─▶ pty
//! pty ─▶ reader thread ─▶ outbound loop ─▶ connection (binary frames)
//! ```
//!
//! The pty API is blocking, so a dedicated thread owns each pty handle and
//! talks to the async loops over bounded channels. Each handle therefore has
//! exactly one writer. Both loops run in one `select!`: whichever finishes
//! first drops the other, then the process is killed and the connection
//! closed.

use std::fmt::Display;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::observability::metrics;
use crate::terminal::frame::Inbound;
use crate::terminal::process::{ProcessLauncher, PtyControl};
use crate::terminal::types::{SessionEnd, TermSize, TerminalError};

/// Chunks buffered between the pty reader thread and the outbound loop.
const OUTPUT_QUEUE: usize = 64;
/// Messages buffered between the inbound loop and the pty writer thread.
const INPUT_QUEUE: usize = 64;
/// Upper bound on flushing accepted input to the pty during teardown.
const INPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A started terminal session, ready to be attached to a connection.
pub struct TerminalBridge {
    id: Uuid,
    size: TermSize,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    control: Arc<dyn PtyControl>,
    read_buffer_bytes: usize,
}

impl TerminalBridge {
    /// Spawn a process through `launcher` with the given initial size.
    pub fn open(
        launcher: &dyn ProcessLauncher,
        size: TermSize,
        read_buffer_bytes: usize,
    ) -> Result<Self, TerminalError> {
        let io = launcher.launch(size)?;
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, size = %size, "Terminal session opened");

        Ok(Self {
            id,
            size,
            reader: io.reader,
            writer: io.writer,
            control: io.control,
            read_buffer_bytes: read_buffer_bytes.max(1),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Relay until either side ends, then tear the whole session down.
    ///
    /// `incoming` yields one item per client message; `outgoing` receives one
    /// item per chunk of pty output.
    pub async fn run<R, W, E>(self, incoming: R, mut outgoing: W) -> SessionEnd
    where
        R: Stream<Item = Result<Bytes, E>> + Unpin,
        W: Sink<Bytes> + Unpin,
        W::Error: Display,
        E: Display,
    {
        let Self {
            id,
            size,
            reader,
            writer,
            control,
            read_buffer_bytes,
        } = self;

        let _active = metrics::TerminalSessionGuard::new();
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_QUEUE);
        let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE);

        if let Err(e) = spawn_reader(id, reader, read_buffer_bytes, output_tx) {
            terminate(id, control).await;
            let _ = outgoing.close().await;
            return SessionEnd::ConnectionFailed(e);
        }
        let input_drained = match spawn_writer(id, writer, input_rx) {
            Ok(done) => done,
            Err(e) => {
                terminate(id, control).await;
                let _ = outgoing.close().await;
                return SessionEnd::ConnectionFailed(e);
            }
        };

        let end = {
            let inbound = inbound_loop(id, size, incoming, input_tx, Arc::clone(&control));
            let outbound = outbound_loop(output_rx, &mut outgoing);
            tokio::select! {
                end = inbound => end,
                end = outbound => end,
            }
        };

        // The input sender went away with the inbound loop; let the writer
        // thread flush what was already accepted.
        if tokio::time::timeout(INPUT_DRAIN_TIMEOUT, input_drained)
            .await
            .is_err()
        {
            tracing::warn!(session_id = %id, "Pty writer did not drain in time");
        }
        terminate(id, control).await;
        if let Err(e) = outgoing.close().await {
            tracing::debug!(session_id = %id, error = %e, "Connection close failed");
        }

        tracing::info!(session_id = %id, reason = ?end, "Terminal session closed");
        end
    }
}

/// Kill and reap the process off the async workers; reaping blocks.
async fn terminate(id: Uuid, control: Arc<dyn PtyControl>) {
    if let Err(e) = tokio::task::spawn_blocking(move || control.terminate()).await {
        tracing::warn!(session_id = %id, error = %e, "Process teardown task failed");
    }
}

/// Connection → process.
async fn inbound_loop<R, E>(
    id: Uuid,
    mut size: TermSize,
    mut incoming: R,
    input: mpsc::Sender<Bytes>,
    control: Arc<dyn PtyControl>,
) -> SessionEnd
where
    R: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    loop {
        let message = match incoming.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(session_id = %id, error = %e, "Connection read failed");
                return SessionEnd::ConnectionFailed(e.to_string());
            }
            None => return SessionEnd::ClientClosed,
        };

        match Inbound::decode(message) {
            Inbound::Control(frame) => {
                let requested = frame.size();
                match control.resize(requested) {
                    Ok(()) => {
                        tracing::debug!(session_id = %id, from = %size, to = %requested, "Pty resized");
                        size = requested;
                    }
                    Err(e) => tracing::warn!(session_id = %id, error = %e, "Resize failed"),
                }
            }
            Inbound::Input(bytes) if bytes.is_empty() => {}
            Inbound::Input(bytes) => {
                if input.send(bytes).await.is_err() {
                    // Writer thread is gone: the pty is closed.
                    return SessionEnd::ProcessExited;
                }
            }
        }
    }
}

/// Process → connection.
async fn outbound_loop<W>(mut output: mpsc::Receiver<Bytes>, outgoing: &mut W) -> SessionEnd
where
    W: Sink<Bytes> + Unpin,
    W::Error: Display,
{
    while let Some(chunk) = output.recv().await {
        if let Err(e) = outgoing.send(chunk).await {
            return SessionEnd::ConnectionFailed(e.to_string());
        }
    }
    SessionEnd::ProcessExited
}

fn spawn_reader(
    id: Uuid,
    mut reader: Box<dyn Read + Send>,
    buffer_bytes: usize,
    output: mpsc::Sender<Bytes>,
) -> Result<(), String> {
    thread::Builder::new()
        .name(format!("pty-reader-{}", id.simple()))
        .spawn(move || {
            let mut buffer = vec![0u8; buffer_bytes];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if output
                            .blocking_send(Bytes::copy_from_slice(&buffer[..n]))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        // EIO is how Linux reports a closed slave side.
                        tracing::debug!(session_id = %id, error = %e, "Pty read ended");
                        break;
                    }
                }
            }
        })
        .map(|_| ())
        .map_err(|e| format!("failed to spawn pty reader: {}", e))
}

fn spawn_writer(
    id: Uuid,
    mut writer: Box<dyn Write + Send>,
    mut input: mpsc::Receiver<Bytes>,
) -> Result<oneshot::Receiver<()>, String> {
    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name(format!("pty-writer-{}", id.simple()))
        .spawn(move || {
            while let Some(bytes) = input.blocking_recv() {
                if let Err(e) = writer.write_all(&bytes).and_then(|_| writer.flush()) {
                    tracing::debug!(session_id = %id, error = %e, "Pty write failed");
                    break;
                }
            }
            let _ = done_tx.send(());
        })
        .map_err(|e| format!("failed to spawn pty writer: {}", e))?;
    Ok(done_rx)
}
