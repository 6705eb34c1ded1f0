//! Process supervision
//!
//! This module spawns background shell commands, collects their output,
//! tracks their lifecycle and stops them on request.

mod collector;
mod handle;
mod launcher;
mod manager;
mod registry;
pub mod termination;
pub mod tracker;
mod types;

pub use handle::*;
pub use launcher::StartRequest;
pub use manager::*;
pub use registry::*;
pub use termination::{TerminationOutcome, TerminationPolicy};
pub use types::*;
