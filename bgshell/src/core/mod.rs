//! Core modules
//!
//! - Configuration management
//! - Error types
//! - Lifecycle events
//! - Log buffering

mod config;
mod error;
mod log_buffer;

pub mod ipc;

pub use config::*;
pub use error::*;
pub use ipc::*;
pub use log_buffer::*;
