//! The set of supervised processes
//!
//! The registry lock only guards membership. Each entry carries its own
//! buffer lock, so unrelated processes never contend with each other.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::{tracker, ProcessInfo, SupervisedProcess};
use crate::core::{EventSender, ProcessId, Result, SupervisorError};

const AUTO_ID_PREFIX: &str = "shell_";

#[derive(Debug, Default)]
struct Entries {
    processes: HashMap<ProcessId, Arc<SupervisedProcess>>,
    /// Ids handed out by `allocate_id` whose process is not registered yet
    reserved: HashSet<ProcessId>,
    /// Last auto-generated id number
    counter: u64,
    /// Registration sequence, used to keep `list()` in start order
    next_seq: u64,
}

impl Entries {
    fn is_taken(&self, id: &str) -> bool {
        self.processes.contains_key(id) || self.reserved.contains(id)
    }
}

/// Owns every supervised process
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    entries: RwLock<Entries>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id. With no (or a blank) caller id, the next free
    /// `shell_N` is generated. A caller id already registered or reserved is
    /// rejected.
    pub fn allocate_id(&self, requested: Option<&str>) -> Result<ProcessId> {
        let mut entries = self.entries.write();

        let id = match requested.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                if entries.is_taken(id) {
                    debug!(id, "Rejected duplicate process id");
                    return Err(SupervisorError::DuplicateId { id: id.to_string() });
                }
                id.to_string()
            }
            None => loop {
                entries.counter += 1;
                let candidate = format!("{AUTO_ID_PREFIX}{}", entries.counter);
                if !entries.is_taken(&candidate) {
                    break candidate;
                }
            },
        };

        entries.reserved.insert(id.clone());
        Ok(id)
    }

    /// Give back a reservation that will not be registered
    pub fn release(&self, id: &str) {
        self.entries.write().reserved.remove(id);
    }

    /// Insert a process under its (reserved) id
    pub fn register(&self, mut process: SupervisedProcess) -> Arc<SupervisedProcess> {
        let mut entries = self.entries.write();
        entries.reserved.remove(&process.id);
        process.seq = entries.next_seq;
        entries.next_seq += 1;

        let process = Arc::new(process);
        entries
            .processes
            .insert(process.id.clone(), Arc::clone(&process));
        process
    }

    pub fn get(&self, id: &str) -> Option<Arc<SupervisedProcess>> {
        self.entries.read().processes.get(id).cloned()
    }

    /// All entries in registration order
    pub fn entries(&self) -> Vec<Arc<SupervisedProcess>> {
        let mut all: Vec<_> = self.entries.read().processes.values().cloned().collect();
        all.sort_by_key(|p| p.seq);
        all
    }

    /// Snapshot of every entry, each refreshed before it is copied out
    pub fn list(&self, events: Option<&EventSender>) -> Vec<ProcessInfo> {
        self.entries()
            .iter()
            .map(|process| {
                tracker::refresh(process, events);
                process.info()
            })
            .collect()
    }

    /// Remove the entry only if it is in a terminal state
    pub fn remove_if_terminal(&self, id: &str, events: Option<&EventSender>) -> bool {
        let Some(process) = self.get(id) else {
            return false;
        };
        if !tracker::refresh(&process, events).is_terminal() {
            return false;
        }

        let removed = self.entries.write().processes.remove(id);
        match removed {
            Some(process) => {
                process.abort_readers();
                debug!(id, "Removed process");
                true
            }
            None => false,
        }
    }

    /// Remove every terminal entry and return how many were removed
    pub fn prune(&self, events: Option<&EventSender>) -> usize {
        let terminal: Vec<ProcessId> = self
            .entries()
            .iter()
            .filter(|p| tracker::refresh(p, events).is_terminal())
            .map(|p| p.id.clone())
            .collect();

        let removed = terminal
            .iter()
            .filter(|id| self.remove_if_terminal(id, events))
            .count();
        if removed > 0 {
            info!(removed, "Pruned finished processes");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().processes.is_empty()
    }
}
