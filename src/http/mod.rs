//! HTTP front door.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (router, request ID, tracing, session gate)
//!     → /login, /portal/*            portal pages and APIs
//!     → /portal/ws/terminal          websocket.rs → terminal bridge
//!     → everything else              reverse proxy
//! ```

pub mod request;
pub mod server;
pub mod websocket;

pub use request::{request_id, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
