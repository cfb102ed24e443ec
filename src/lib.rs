//! Token-gated web portal for a single backend service.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!   Browser ──────────▶│ http (router, request ID, trace)             │
//!                      │   │                                          │
//!                      │   ▼                                          │
//!                      │ session gate ──▶ /login, /logout             │
//!                      │   │                                          │
//!                      │   ├──▶ portal   pages, files, mgmt ──────────┼──▶ backend binary
//!                      │   ├──▶ terminal websocket ⇄ pty ─────────────┼──▶ shell
//!                      │   └──▶ proxy    buffered / streaming ────────┼──▶ upstream origin
//!                      │                                              │
//!                      │ config · observability · lifecycle           │
//!                      └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod terminal;

// Portal surface
pub mod portal;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::PortalConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
