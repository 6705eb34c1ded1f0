//! The supervised process entity: child handle, buffers and lifecycle fields

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::process::Child;
use tokio::task::JoinHandle;

use super::{ProcessInfo, ProcessStatus};
use crate::core::{LogBuffer, ProcessId, STDERR_TAG};

/// Which pipe a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Mutable part of a supervised process, guarded by its buffer lock
#[derive(Debug)]
pub struct ProcessState {
    pub status: ProcessStatus,
    pub ended_at: Option<DateTime<Local>>,
    pub exit_code: Option<i32>,
    /// Set once a termination request has been issued
    pub kill_requested: bool,
    /// Combined stdout + tagged stderr, in arrival order
    pub output: LogBuffer,
    /// Stderr lines only
    pub errors: LogBuffer,
}

impl ProcessState {
    pub fn new(max_buffer_lines: usize) -> Self {
        Self {
            status: ProcessStatus::Running,
            ended_at: None,
            exit_code: None,
            kill_requested: false,
            output: LogBuffer::new(max_buffer_lines),
            errors: LogBuffer::new(max_buffer_lines),
        }
    }

    /// Append one line read from `stream`
    pub fn append(&mut self, stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => self.output.push_line(line, false),
            Stream::Stderr => {
                self.errors.push_line(line, true);
                self.output.push_line(&format!("{STDERR_TAG}{line}"), true);
            }
        }
    }

    /// Record that the child has exited.
    ///
    /// Returns the new status if this call made the transition, or `None`
    /// when the state was already terminal.
    pub fn finish(&mut self, exit_code: Option<i32>) -> Option<ProcessStatus> {
        let next = match self.status {
            ProcessStatus::Running if self.kill_requested => ProcessStatus::Killed,
            ProcessStatus::Running => ProcessStatus::from_exit(exit_code),
            ProcessStatus::Completed | ProcessStatus::Failed | ProcessStatus::Killed => {
                return None
            }
        };
        self.status = next;
        self.ended_at = Some(Local::now());
        self.exit_code = exit_code;
        Some(next)
    }
}

/// One tracked child process
#[derive(Debug)]
pub struct SupervisedProcess {
    pub(crate) id: ProcessId,
    pub(crate) command: String,
    pub(crate) pid: Option<u32>,
    pub(crate) started_at: DateTime<Local>,
    /// Registration order, assigned by the registry
    pub(crate) seq: u64,
    pub(crate) child: Mutex<Child>,
    /// The buffer lock: guards both buffers and the lifecycle fields
    pub(crate) state: Arc<Mutex<ProcessState>>,
    pub(crate) readers: Mutex<Vec<JoinHandle<()>>>,
}

impl SupervisedProcess {
    pub(crate) fn new(
        id: ProcessId,
        command: String,
        child: Child,
        state: Arc<Mutex<ProcessState>>,
        readers: Vec<JoinHandle<()>>,
    ) -> Self {
        let pid = child.id();
        Self {
            id,
            command,
            pid,
            started_at: Local::now(),
            seq: 0,
            child: Mutex::new(child),
            state,
            readers: Mutex::new(readers),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Status as last recorded, without polling the child
    pub fn status(&self) -> ProcessStatus {
        self.state.lock().status
    }

    /// Copy the entry out as a snapshot
    pub fn info(&self) -> ProcessInfo {
        let state = self.state.lock();
        let end = state.ended_at.unwrap_or_else(Local::now);
        ProcessInfo {
            id: self.id.clone(),
            command: self.command.clone(),
            status: state.status,
            pid: if state.status.is_running() { self.pid } else { None },
            started_at: self.started_at,
            ended_at: state.ended_at,
            duration: end.signed_duration_since(self.started_at),
            exit_code: state.exit_code,
            output_line_count: state.output.len(),
            dropped_lines: state.output.dropped(),
        }
    }

    /// Take the reader task handles, leaving none behind
    pub(crate) fn take_readers(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.readers.lock())
    }

    /// Abort any reader task that is still attached
    pub(crate) fn abort_readers(&self) {
        for task in self.take_readers() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_goes_to_both_buffers() {
        let mut state = ProcessState::new(100);
        state.append(Stream::Stdout, "out");
        state.append(Stream::Stderr, "bad");

        assert_eq!(state.output.render(None), "out\n[ERROR] bad\n");
        assert_eq!(state.errors.render(None), "bad\n");
    }

    #[test]
    fn test_finish_is_one_way() {
        let mut state = ProcessState::new(10);
        assert_eq!(state.finish(Some(0)), Some(ProcessStatus::Completed));
        let ended = state.ended_at;
        assert!(ended.is_some());

        // A second observer loses and changes nothing
        assert_eq!(state.finish(Some(1)), None);
        assert_eq!(state.status, ProcessStatus::Completed);
        assert_eq!(state.exit_code, Some(0));
        assert_eq!(state.ended_at, ended);
    }

    #[test]
    fn test_finish_after_kill_request_is_killed() {
        let mut state = ProcessState::new(10);
        state.kill_requested = true;
        assert_eq!(state.finish(Some(-15)), Some(ProcessStatus::Killed));
        assert_eq!(state.exit_code, Some(-15));
    }

    #[test]
    fn test_non_zero_exit_is_failed() {
        let mut state = ProcessState::new(10);
        assert_eq!(state.finish(Some(1)), Some(ProcessStatus::Failed));
    }
}
