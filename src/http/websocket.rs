//! WebSocket endpoint for the browser terminal.
//!
//! # Data Flow
//! ```text
//! browser (xterm.js) ←── binary frames ──→ this module ←──→ TerminalBridge ←──→ pty
//! ```
//!
//! Text and binary frames are both terminal input; output always goes out as
//! binary. A close frame ends the inbound side.

use std::future::ready;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::http::server::AppState;
use crate::terminal::{SessionEnd, TermSize, TerminalBridge, TerminalError};

pub async fn terminal_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_terminal(state, socket))
}

async fn serve_terminal(state: AppState, socket: WebSocket) {
    let terminal = &state.config.terminal;
    let size = TermSize::new(terminal.rows, terminal.cols);
    let read_buffer_bytes = terminal.read_buffer_bytes;
    let launcher = state.launcher.clone();

    let opened = tokio::task::spawn_blocking(move || {
        TerminalBridge::open(launcher.as_ref(), size, read_buffer_bytes)
    })
    .await
    .unwrap_or_else(|e| Err(TerminalError::ProcessStart(e.to_string())));

    let bridge = match opened {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open terminal session");
            return;
        }
    };
    let session_id = bridge.id();

    let (sink, stream) = socket.split();
    let incoming = Box::pin(
        stream
            .take_while(|msg| ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                ready(match msg {
                    Ok(Message::Binary(data)) => Some(Ok(data)),
                    Ok(Message::Text(text)) => Some(Ok(Bytes::copy_from_slice(text.as_str().as_bytes()))),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                })
            }),
    );
    let outgoing = Box::pin(sink.with(|chunk: Bytes| ready(Ok::<_, axum::Error>(Message::Binary(chunk)))));

    match bridge.run(incoming, outgoing).await {
        SessionEnd::ConnectionFailed(reason) => {
            tracing::warn!(session_id = %session_id, reason = %reason, "Terminal session failed")
        }
        end => tracing::info!(session_id = %session_id, end = ?end, "Terminal session closed"),
    }
}
