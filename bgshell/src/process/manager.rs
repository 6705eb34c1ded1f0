//! Process manager: the operations exposed to front-ends
//!
//! A `ProcessManager` is an ordinary value. Share it behind an `Arc` to use
//! it from several tasks; independent managers never see each other's
//! processes.

use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::info;

use super::termination::{self, TerminationOutcome, TerminationPolicy};
use super::{launcher, tracker, ProcessInfo, ProcessRegistry, StartRequest, SupervisedProcess};
use crate::core::{EventSender, ProcessId, Result, SupervisorError, SupervisorSettings};

/// Supervises background shell commands
#[derive(Debug)]
pub struct ProcessManager {
    registry: ProcessRegistry,
    settings: SupervisorSettings,
    policy: TerminationPolicy,
    /// Channel to send lifecycle events to the front-end
    event_tx: Option<EventSender>,
}

impl ProcessManager {
    /// Create a new process manager
    pub fn new(settings: SupervisorSettings) -> Self {
        Self {
            registry: ProcessRegistry::new(),
            policy: TerminationPolicy::from(&settings),
            settings,
            event_tx: None,
        }
    }

    /// Create a process manager that reports lifecycle events on `event_tx`
    pub fn with_events(settings: SupervisorSettings, event_tx: EventSender) -> Self {
        Self {
            event_tx: Some(event_tx),
            ..Self::new(settings)
        }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    fn events(&self) -> Option<&EventSender> {
        self.event_tx.as_ref()
    }

    fn lookup(&self, id: &str) -> Result<Arc<SupervisedProcess>> {
        self.registry
            .get(id)
            .ok_or_else(|| SupervisorError::not_found(id))
    }

    /// Start a command in the background and return its id without waiting
    /// for it. Must be called from within a Tokio runtime.
    pub fn start(&self, request: StartRequest) -> Result<ProcessId> {
        launcher::launch(&self.registry, request, &self.settings, self.events())
    }

    /// Refreshed snapshot of one process
    pub fn get(&self, id: &str) -> Result<ProcessInfo> {
        let process = self.lookup(id)?;
        tracker::refresh(&process, self.events());
        Ok(process.info())
    }

    /// Combined output of a process, one line per row.
    ///
    /// With `filter`, only lines matching the regular expression are returned,
    /// in their original order. With `drain`, the output buffer is cleared
    /// after it is copied, whether or not a filter was applied.
    pub fn get_output(&self, id: &str, filter: Option<&str>, drain: bool) -> Result<String> {
        let process = self.lookup(id)?;
        let filter = filter
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| SupervisorError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;

        tracker::refresh(&process, self.events());

        let mut state = process.state.lock();
        let output = state.output.render(filter.as_ref());
        if drain {
            state.output.clear();
        }
        Ok(output)
    }

    /// Stderr lines of a process, untagged
    pub fn get_errors(&self, id: &str) -> Result<String> {
        let process = self.lookup(id)?;
        let state = process.state.lock();
        Ok(state.errors.render(None))
    }

    /// Stop a process. See [`TerminationOutcome`] for the possible results;
    /// this call never waits longer than the configured grace and kill timeouts.
    pub async fn terminate(&self, id: &str, force: bool) -> Result<TerminationOutcome> {
        let process = self.lookup(id)?;
        Ok(termination::terminate(&process, force, &self.policy, self.events()).await)
    }

    /// Wait up to `limit` for a process to finish and for its output readers
    /// to drain, then return its latest snapshot. Does not signal the process.
    pub async fn wait(&self, id: &str, limit: Duration) -> Result<ProcessInfo> {
        let process = self.lookup(id)?;
        let deadline = Instant::now() + limit;
        loop {
            let terminal = tracker::refresh(&process, self.events()).is_terminal();
            let drained = process.readers.lock().iter().all(|task| task.is_finished());
            let now = Instant::now();
            if (terminal && drained) || now >= deadline {
                return Ok(process.info());
            }
            sleep(self.policy.poll_interval.min(deadline - now)).await;
        }
    }

    /// Snapshot of every process, in start order
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.registry.list(self.events())
    }

    /// Remove every finished process and return how many were removed.
    /// Running processes are never removed.
    pub fn prune(&self) -> usize {
        self.registry.prune(self.events())
    }

    /// Remove one process if it has finished
    pub fn remove(&self, id: &str) -> Result<bool> {
        self.lookup(id)?;
        Ok(self.registry.remove_if_terminal(id, self.events()))
    }

    /// Get the number of running processes
    pub fn running_count(&self) -> usize {
        self.list()
            .iter()
            .filter(|info| info.status.is_running())
            .count()
    }

    /// Kill every running process and join all output readers.
    ///
    /// Readers that have not finished within the kill timeout are aborted.
    pub async fn shutdown(&self) {
        let processes = self.registry.entries();

        for process in &processes {
            if !tracker::refresh(process, self.events()).is_terminal() {
                termination::terminate(process, true, &self.policy, self.events()).await;
            }
        }

        let mut aborted = 0usize;
        for process in &processes {
            for task in process.take_readers() {
                let abort = task.abort_handle();
                if timeout(self.policy.kill_timeout, task).await.is_err() {
                    abort.abort();
                    aborted += 1;
                }
            }
        }

        info!(processes = processes.len(), aborted, "Supervisor shut down");
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new(SupervisorSettings::default())
    }
}
