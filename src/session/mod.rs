//! Portal authentication.
//!
//! A single shared token, presented either as the `portal_token` cookie set
//! by `/login` or as an `Authorization: Bearer` header.

pub mod gate;
pub mod login;

pub use gate::{generate_token, is_authorized, require_session, SESSION_COOKIE};
