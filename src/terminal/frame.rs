//! Inbound message decoding.
//!
//! Every message from the client is either a control frame or raw terminal
//! input. A message is a control frame only when it starts with `{` and
//! decodes as JSON with a known `type` tag; anything else, including
//! malformed JSON, is input and is forwarded whole.

use axum::body::Bytes;
use serde::Deserialize;

use crate::terminal::types::TermSize;

const STRUCTURED_MARKER: u8 = b'{';

/// Structured control messages sent by the terminal page.
///
/// Resize dimensions are taken as sent. Missing fields are zero, and
/// negative or oversized values wrap into the pty's 16-bit window size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Resize {
        #[serde(default)]
        rows: i64,
        #[serde(default)]
        cols: i64,
    },
}

impl ControlFrame {
    /// Size requested by a resize frame.
    pub fn size(&self) -> TermSize {
        match *self {
            ControlFrame::Resize { rows, cols } => TermSize::new(rows as u16, cols as u16),
        }
    }
}

/// One decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Control(ControlFrame),
    Input(Bytes),
}

impl Inbound {
    /// Decode a message. Never fails: undecodable frames become input.
    pub fn decode(message: Bytes) -> Self {
        if message.first() != Some(&STRUCTURED_MARKER) {
            return Inbound::Input(message);
        }
        match serde_json::from_slice::<ControlFrame>(&message) {
            Ok(frame) => Inbound::Control(frame),
            Err(e) => {
                tracing::trace!(error = %e, len = message.len(), "Malformed control frame, forwarding as input");
                Inbound::Input(message)
            }
        }
    }
}
