//! Spawning supervised processes

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use super::{collector, ProcessRegistry, ProcessState, SupervisedProcess};
use crate::core::{
    emit, EventSender, ProcessEvent, ProcessId, Result, SupervisorError, SupervisorSettings,
};

/// Parameters for starting a process
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    /// Shell command line
    pub command: String,
    /// Caller-chosen id; a sequential one is generated when absent
    pub id: Option<ProcessId>,
    /// Working directory; the supervisor's own when absent
    pub cwd: Option<PathBuf>,
    /// Variables layered over the inherited environment
    pub env: HashMap<String, String>,
}

impl StartRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<ProcessId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Default shell for the platform
fn default_shell() -> &'static str {
    if cfg!(windows) {
        "cmd"
    } else {
        "sh"
    }
}

fn shell_command(shell: &str, command: &str) -> Command {
    let mut cmd = Command::new(shell);
    if cfg!(windows) && shell.eq_ignore_ascii_case("cmd") {
        cmd.arg("/C");
    } else {
        cmd.arg("-c");
    }
    cmd.arg(command);
    cmd
}

/// Spawn the child, start its readers and register it.
///
/// The id is reserved before spawning so a concurrent start cannot claim it;
/// a spawn failure releases the reservation and leaves no entry behind.
/// Must be called from within a Tokio runtime.
pub(crate) fn launch(
    registry: &ProcessRegistry,
    request: StartRequest,
    settings: &SupervisorSettings,
    events: Option<&EventSender>,
) -> Result<ProcessId> {
    let id = registry.allocate_id(request.id.as_deref())?;

    let shell = settings.shell.as_deref().unwrap_or(default_shell());
    let mut cmd = shell_command(shell, &request.command);
    if let Some(cwd) = &request.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&request.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so signals reach everything the shell starts
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            registry.release(&id);
            warn!(id = %id, command = %request.command, error = %source, "Failed to spawn process");
            emit(
                events,
                ProcessEvent::SpawnFailed {
                    id,
                    error: source.to_string(),
                },
            );
            return Err(SupervisorError::SpawnFailed {
                command: request.command,
                source,
            });
        }
    };

    let state = Arc::new(Mutex::new(ProcessState::new(settings.max_buffer_lines)));
    let readers =
        collector::spawn_collectors(&id, child.stdout.take(), child.stderr.take(), &state);

    let process = SupervisedProcess::new(id.clone(), request.command, child, state, readers);
    let pid = process.pid;
    info!(id = %id, pid = ?pid, command = %process.command, "Process started");

    registry.register(process);
    emit(events, ProcessEvent::Started { id: id.clone(), pid });

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = StartRequest::new("make test")
            .with_id("build")
            .with_cwd("/tmp")
            .with_env("RUST_LOG", "debug");

        assert_eq!(request.command, "make test");
        assert_eq!(request.id.as_deref(), Some("build"));
        assert_eq!(request.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(request.env.get("RUST_LOG").map(String::as_str), Some("debug"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_cwd_is_spawn_failure_and_frees_id() {
        let registry = ProcessRegistry::new();
        let settings = SupervisorSettings::default();

        let err = launch(
            &registry,
            StartRequest::new("true").with_id("x").with_cwd("/definitely/not/here"),
            &settings,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailed { .. }));
        assert!(registry.is_empty());

        // The reserved id was released
        assert_eq!(registry.allocate_id(Some("x")).unwrap(), "x");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_shell_is_spawn_failure() {
        let registry = ProcessRegistry::new();
        let settings = SupervisorSettings {
            shell: Some("/no/such/shell".into()),
            ..Default::default()
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let result = launch(&registry, StartRequest::new("true"), &settings, Some(&tx));
        assert!(matches!(result, Err(SupervisorError::SpawnFailed { .. })));
        assert!(registry.is_empty());
        assert!(matches!(rx.try_recv(), Ok(ProcessEvent::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_configured_and_default_shell_both_spawn() {
        let registry = ProcessRegistry::new();
        let configured = SupervisorSettings {
            shell: Some("sh".into()),
            ..Default::default()
        };

        let a = launch(&registry, StartRequest::new("true"), &configured, None).unwrap();
        let b = launch(
            &registry,
            StartRequest::new("true"),
            &SupervisorSettings::default(),
            None,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&a).is_some());
        assert!(registry.get(&b).is_some());
    }
}
