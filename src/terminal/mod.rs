//! Remote shell subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgrade (http/websocket.rs)
//!     → process.rs (allocate pty, spawn shell)
//!     → bridge.rs (two relay loops, shared teardown)
//!     → frame.rs (control frame vs raw input)
//! ```
//!
//! # Design Decisions
//! - One process per connection, nothing shared across sessions
//! - The pty is an injected capability so the bridge runs against fakes in tests
//! - Either side ending ends the whole session

pub mod bridge;
pub mod frame;
pub mod process;
pub mod types;

pub use bridge::TerminalBridge;
pub use frame::{ControlFrame, Inbound};
pub use process::{ProcessIo, ProcessLauncher, PtyControl, ShellLauncher};
pub use types::{SessionEnd, TermSize, TerminalError};
