//! The portal itself: pages, the file browser API and backend management.

pub mod files;
pub mod mgmt;
pub mod pages;
pub mod supervisor;

pub use files::{FileError, FileStore};
pub use supervisor::{Supervisor, SupervisorError};
