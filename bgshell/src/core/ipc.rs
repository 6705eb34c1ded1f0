//! Lifecycle notifications emitted by the process manager

use tokio::sync::mpsc;

/// Identifier of a supervised process
pub type ProcessId = String;

/// Sender half handed to the process manager
pub type EventSender = mpsc::UnboundedSender<ProcessEvent>;

/// Events emitted by the process manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Process has started
    Started { id: ProcessId, pid: Option<u32> },
    /// Process could not be spawned; no entry was registered
    SpawnFailed { id: ProcessId, error: String },
    /// Process exited on its own
    Exited {
        id: ProcessId,
        exit_code: Option<i32>,
    },
    /// Process exited after a termination request
    Killed {
        id: ProcessId,
        exit_code: Option<i32>,
    },
}

impl ProcessEvent {
    /// The id the event refers to
    pub fn id(&self) -> &str {
        match self {
            ProcessEvent::Started { id, .. }
            | ProcessEvent::SpawnFailed { id, .. }
            | ProcessEvent::Exited { id, .. }
            | ProcessEvent::Killed { id, .. } => id,
        }
    }
}

/// Deliver an event if anyone is listening. A closed channel is not an error.
pub(crate) fn emit(tx: Option<&EventSender>, event: ProcessEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
