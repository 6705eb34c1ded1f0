//! Lazy status refresh
//!
//! There is no polling thread: every status-observing operation calls
//! [`refresh`], which does a non-blocking `try_wait` on a running child and
//! records the terminal transition if it has exited.

use std::process::ExitStatus;
use tracing::{info, warn};

use super::{ProcessStatus, SupervisedProcess};
use crate::core::{emit, EventSender, ProcessEvent};

/// Exit code for a finished child. On unix a signal death is reported as the
/// negated signal number.
pub(crate) fn exit_code_of(status: ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|sig| -sig))
    }

    #[cfg(not(unix))]
    {
        status.code()
    }
}

/// Bring the process's status up to date and return it
pub fn refresh(process: &SupervisedProcess, events: Option<&EventSender>) -> ProcessStatus {
    {
        let state = process.state.lock();
        if state.status.is_terminal() {
            return state.status;
        }
    }

    // The child lock is released before the state lock is taken
    let polled = process.child.lock().try_wait();

    let exit_code = match polled {
        Ok(None) => return ProcessStatus::Running,
        Ok(Some(status)) => exit_code_of(status),
        Err(e) => {
            warn!(id = %process.id, error = %e, "Failed to poll process status");
            None
        }
    };

    record_exit(process, exit_code, events)
}

/// Apply a terminal transition. Only the first caller wins; later callers
/// see the already-terminal status.
pub(crate) fn record_exit(
    process: &SupervisedProcess,
    exit_code: Option<i32>,
    events: Option<&EventSender>,
) -> ProcessStatus {
    let mut state = process.state.lock();
    let Some(status) = state.finish(exit_code) else {
        return state.status;
    };
    drop(state);

    info!(id = %process.id, status = status.as_str(), ?exit_code, "Process finished");
    let id = process.id.clone();
    let event = match status {
        ProcessStatus::Killed => ProcessEvent::Killed { id, exit_code },
        ProcessStatus::Completed | ProcessStatus::Failed => ProcessEvent::Exited { id, exit_code },
        ProcessStatus::Running => return status,
    };
    emit(events, event);
    status
}
