//! Graceful-then-forced termination with bounded waits

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::{tracker, SupervisedProcess};
use crate::core::{EventSender, SupervisorSettings};

/// How a termination request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process had already reached a terminal state; nothing was sent
    AlreadyExited,
    /// Exited within the grace period after the cooperative signal
    Graceful,
    /// Ignored the cooperative signal and exited after the forceful one
    Escalated,
    /// Exited after an immediate forceful kill
    Forced,
    /// Still not observed dead after every signal and wait was used up
    Unconfirmed,
}

impl TerminationOutcome {
    /// Whether the process is known to be dead
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, TerminationOutcome::Unconfirmed)
    }
}

/// Wait budget for a termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub grace_timeout: Duration,
    pub kill_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&SupervisorSettings> for TerminationPolicy {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            grace_timeout: settings.grace_timeout(),
            kill_timeout: settings.kill_timeout(),
            poll_interval: settings.poll_interval(),
        }
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::from(&SupervisorSettings::default())
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Terminate a process, escalating to a forceful kill if it does not exit in time.
///
/// Never blocks longer than `grace_timeout + kill_timeout` (or `kill_timeout`
/// when `force` is set), plus one poll interval.
pub async fn terminate(
    process: &SupervisedProcess,
    force: bool,
    policy: &TerminationPolicy,
    events: Option<&EventSender>,
) -> TerminationOutcome {
    if tracker::refresh(process, events).is_terminal() {
        debug!(id = %process.id, "Process already stopped");
        return TerminationOutcome::AlreadyExited;
    }

    {
        let mut state = process.state.lock();
        if state.status.is_terminal() {
            return TerminationOutcome::AlreadyExited;
        }
        state.kill_requested = true;
    }

    info!(id = %process.id, pid = ?process.pid, force, "Terminating process");

    if force {
        send(process, Signal::Kill);
        return if wait_for_exit(process, policy.kill_timeout, policy.poll_interval, events).await {
            TerminationOutcome::Forced
        } else {
            warn!(id = %process.id, "Process did not exit after SIGKILL");
            TerminationOutcome::Unconfirmed
        };
    }

    send(process, Signal::Terminate);
    if wait_for_exit(process, policy.grace_timeout, policy.poll_interval, events).await {
        return TerminationOutcome::Graceful;
    }

    warn!(
        id = %process.id,
        grace_ms = policy.grace_timeout.as_millis() as u64,
        "Process ignored graceful termination, escalating"
    );
    send(process, Signal::Kill);
    if wait_for_exit(process, policy.kill_timeout, policy.poll_interval, events).await {
        TerminationOutcome::Escalated
    } else {
        warn!(id = %process.id, "Process did not exit after escalation");
        TerminationOutcome::Unconfirmed
    }
}

/// Poll until the process is terminal or `timeout` has elapsed
async fn wait_for_exit(
    process: &SupervisedProcess,
    timeout: Duration,
    poll_interval: Duration,
    events: Option<&EventSender>,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if tracker::refresh(process, events).is_terminal() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Deliver a signal to the child's process group. A child that is already
/// gone counts as delivered.
fn send(process: &SupervisedProcess, signal: Signal) {
    let mut child = process.child.lock();

    if let Ok(Some(_)) = child.try_wait() {
        debug!(id = %process.id, "Child already exited, no signal sent");
        return;
    }

    // The pid is only valid while the child has not been reaped
    let Some(pid) = child.id() else {
        return;
    };

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal as NixSignal};
        use nix::unistd::Pid;

        let sig = match signal {
            Signal::Terminate => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
        };
        match killpg(Pid::from_raw(pid as i32), sig) {
            Ok(()) => debug!(id = %process.id, pid, ?sig, "Sent signal to process group"),
            Err(Errno::ESRCH) => debug!(id = %process.id, pid, "Process group already gone"),
            Err(e) => {
                warn!(
                    id = %process.id,
                    pid,
                    error = %e,
                    "Failed to signal process group, signalling child only"
                );
                if let Signal::Kill = signal {
                    if let Err(e) = child.start_kill() {
                        debug!(id = %process.id, pid, error = %e, "Failed to kill child");
                    }
                } else if let Err(e) = nix::sys::signal::kill(Pid::from_raw(pid as i32), sig) {
                    debug!(id = %process.id, pid, error = %e, "Failed to signal child");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        // No cooperative signal here; both requests kill the child
        let _ = signal;
        if let Err(e) = child.start_kill() {
            debug!(id = %process.id, pid, error = %e, "Failed to kill child");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unconfirmed_is_unconfirmed() {
        assert!(TerminationOutcome::AlreadyExited.is_confirmed());
        assert!(TerminationOutcome::Graceful.is_confirmed());
        assert!(TerminationOutcome::Escalated.is_confirmed());
        assert!(TerminationOutcome::Forced.is_confirmed());
        assert!(!TerminationOutcome::Unconfirmed.is_confirmed());
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = SupervisorSettings {
            grace_timeout_ms: 100,
            kill_timeout_ms: 20,
            poll_interval_ms: 0,
            ..Default::default()
        };
        let policy = TerminationPolicy::from(&settings);
        assert_eq!(policy.grace_timeout, Duration::from_millis(100));
        assert_eq!(policy.kill_timeout, Duration::from_millis(20));
        assert_eq!(policy.poll_interval, Duration::from_millis(1));
    }
}
