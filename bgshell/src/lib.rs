//! bgshell - background shell supervisor
//!
//! Launches long-running shell commands, captures their stdout and stderr
//! as they run, tracks whether they are running or finished, and stops them
//! with a graceful signal that escalates to a forceful kill.
//!
//! ```no_run
//! use bgshell::{ProcessManager, StartRequest, SupervisorSettings};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), bgshell::SupervisorError> {
//! let manager = ProcessManager::new(SupervisorSettings::default());
//! let id = manager.start(StartRequest::new("ping -c 3 localhost"))?;
//! let errors_only = manager.get_output(&id, Some(r"^\[ERROR\]"), false)?;
//! print!("{errors_only}");
//! manager.terminate(&id, false).await?;
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod process;
pub mod ui;

pub use crate::core::{
    Config, EventSender, ProcessEvent, ProcessId, Result, SavedCommand, SupervisorError,
    SupervisorSettings,
};
pub use crate::process::{
    ProcessInfo, ProcessManager, ProcessStatus, StartRequest, TerminationOutcome,
};
