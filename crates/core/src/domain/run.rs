// Run Domain Model
// Exit status, supervisor states and the final RunResult

use super::classification::SignalKind;
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Run ID (UUID v4)
pub type RunId = String;

/// How the child process ended
///
/// A non-zero exit code is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code, None if the process was ended by a signal
    pub code: Option<i32>,
    /// Terminating signal number (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Why the process stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// The command ran to completion on its own
    NaturalExit,
    /// The command was killed after a degraded backend was detected
    Terminated,
}

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorState {
    Launching,
    Running,
    Draining,
    Finished,
}

impl SupervisorState {
    pub fn can_transition_to(&self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (Launching, Running)
                | (Launching, Finished)
                | (Running, Draining)
                | (Draining, Finished)
        )
    }

    /// Validate and return the next state
    pub fn transition(self, next: SupervisorState) -> Result<SupervisorState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Launching => write!(f, "LAUNCHING"),
            SupervisorState::Running => write!(f, "RUNNING"),
            SupervisorState::Draining => write!(f, "DRAINING"),
            SupervisorState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Counts of each signal kind observed during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedSignals {
    pub capable_backend_confirmed: usize,
    pub degraded_backend_detected: usize,
}

impl ObservedSignals {
    pub fn record(&mut self, signal: SignalKind) {
        match signal {
            SignalKind::CapableBackendConfirmed => self.capable_backend_confirmed += 1,
            SignalKind::DegradedBackendDetected => self.degraded_backend_detected += 1,
        }
    }

    pub fn contains(&self, signal: SignalKind) -> bool {
        match signal {
            SignalKind::CapableBackendConfirmed => self.capable_backend_confirmed > 0,
            SignalKind::DegradedBackendDetected => self.degraded_backend_detected > 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.capable_backend_confirmed == 0 && self.degraded_backend_detected == 0
    }
}

/// Final outcome of a supervised run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub command: String,
    pub outcome: RunOutcome,
    pub exit_status: ExitStatus,
    pub signals: ObservedSignals,
    pub termination_issued: bool,
    /// Set when the kill failed and the run continued (hardened mode)
    pub termination_error: Option<String>,
    pub duration_ms: i64,
}

impl RunResult {
    /// True when the command fell back to a degraded backend
    pub fn degraded(&self) -> bool {
        self.signals.contains(SignalKind::DegradedBackendDetected)
    }
}
