//! Process types and status management

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::ProcessId;

/// Status of a supervised process
///
/// `Running` is the only non-terminal state. Transitions go one way, from
/// `Running` into exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Process is running
    Running,
    /// Process exited with code 0
    Completed,
    /// Process exited with a non-zero code, or by a signal it was not asked to take
    Failed,
    /// Process exited after a termination request
    Killed,
}

impl ProcessStatus {
    /// Get a short string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Killed => "killed",
        }
    }

    /// Check if the process is running
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }

    /// Check if no further transition can happen
    pub fn is_terminal(&self) -> bool {
        match self {
            ProcessStatus::Running => false,
            ProcessStatus::Completed | ProcessStatus::Failed | ProcessStatus::Killed => true,
        }
    }

    /// Terminal status for a process that exited on its own
    pub(crate) fn from_exit(exit_code: Option<i32>) -> Self {
        match exit_code {
            Some(0) => ProcessStatus::Completed,
            _ => ProcessStatus::Failed,
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Running => write!(f, "● running"),
            ProcessStatus::Completed => write!(f, "✓ completed"),
            ProcessStatus::Failed => write!(f, "✗ failed"),
            ProcessStatus::Killed => write!(f, "⊗ killed"),
        }
    }
}

/// Point-in-time snapshot of a supervised process, as returned by `list()`
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub command: String,
    pub status: ProcessStatus,
    /// OS process id, only reported while running
    pub pid: Option<u32>,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    /// Time from start to end, or to now while running
    #[serde(serialize_with = "serialize_duration")]
    pub duration: chrono::Duration,
    pub exit_code: Option<i32>,
    /// Lines currently held in the combined output buffer
    pub output_line_count: usize,
    /// Lines evicted from the combined output buffer because it was full
    pub dropped_lines: u64,
}

impl ProcessInfo {
    /// Get the runtime string
    pub fn runtime(&self) -> String {
        format_duration(self.duration)
    }
}

fn serialize_duration<S: serde::Serializer>(
    duration: &chrono::Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(duration.num_milliseconds())
}

/// Format a duration as a human-readable string
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
