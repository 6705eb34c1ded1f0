//! Configuration management with YAML persistence

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::error::{Result, SupervisorError};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Supervisor tunables
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Saved commands for quick access
    #[serde(default)]
    pub saved_commands: Vec<SavedCommand>,
}

/// A saved command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCommand {
    /// Display name, also used as the process id
    pub name: String,
    /// The command to execute
    pub command: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Working directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether to start with `bgshell saved`
    #[serde(default)]
    pub auto_start: bool,
}

impl SavedCommand {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: None,
            cwd: None,
            env: HashMap::new(),
            auto_start: false,
        }
    }
}

/// Supervisor preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// How long a graceful termination may take before escalating
    #[serde(default = "default_grace_timeout")]
    pub grace_timeout_ms: u64,

    /// How long to wait for a forcefully killed process to be reaped
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout_ms: u64,

    /// Exit polling cadence while terminating
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum lines kept per output and error buffer
    #[serde(default = "default_max_buffer_lines")]
    pub max_buffer_lines: usize,

    /// Shell used to run commands; platform default when unset
    #[serde(default)]
    pub shell: Option<String>,
}

// Default value functions for serde
fn default_grace_timeout() -> u64 {
    5000
}

fn default_kill_timeout() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    50
}

fn default_max_buffer_lines() -> usize {
    10000
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_timeout_ms: default_grace_timeout(),
            kill_timeout_ms: default_kill_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_buffer_lines: default_max_buffer_lines(),
            shell: None,
        }
    }
}

impl SupervisorSettings {
    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bgshell")
            .join("config.yaml")
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(Self::default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| SupervisorError::Config(format!("{}: {e}", path.display())))?;
            serde_yaml::from_str(&content)
                .map_err(|e| SupervisorError::Config(format!("{}: {e}", path.display())))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let path = path.unwrap_or_else(Self::default_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SupervisorError::Config(format!("{}: {e}", parent.display())))?;
        }

        let content =
            serde_yaml::to_string(self).map_err(|e| SupervisorError::Config(e.to_string()))?;
        std::fs::write(&path, content)
            .map_err(|e| SupervisorError::Config(format!("{}: {e}", path.display())))?;

        Ok(())
    }

    /// Add a saved command, replacing any existing one with the same name.
    /// Returns true when an entry was replaced.
    pub fn add_saved_command(&mut self, saved: SavedCommand) -> bool {
        match self.saved_commands.iter_mut().find(|c| c.name == saved.name) {
            Some(existing) => {
                *existing = saved;
                true
            }
            None => {
                self.saved_commands.push(saved);
                false
            }
        }
    }

    /// Remove a saved command by name. Returns false when there was none.
    pub fn remove_saved_command(&mut self, name: &str) -> bool {
        let before = self.saved_commands.len();
        self.saved_commands.retain(|c| c.name != name);
        self.saved_commands.len() != before
    }

    /// Get commands that should auto-start
    pub fn auto_start_commands(&self) -> Vec<&SavedCommand> {
        self.saved_commands.iter().filter(|c| c.auto_start).collect()
    }
}
