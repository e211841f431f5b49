//! Daemon lifecycle state machine.
//!
//! ```text
//! STOPPED -> STARTING -> RUNNING -> STOPPING -> STOPPED
//! ```
//!
//! A failed start goes back from `STARTING` to `STOPPED`. Anything else is
//! an [`EgregoreError::InvalidTransition`].

use egregore_core::EgregoreError;
use std::fmt;

/// Where the daemon is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaemonState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl DaemonState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
        }
    }

    /// Whether `self -> to` is an allowed edge.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one daemon lifetime and logs every transition.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: DaemonState,
}

impl Lifecycle {
    /// A lifecycle already in `state`, for supervising an existing process.
    #[must_use]
    pub fn at(state: DaemonState) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Move to `to`, or fail without changing state.
    pub fn advance(&mut self, to: DaemonState) -> Result<(), EgregoreError> {
        if !self.state.can_transition(to) {
            return Err(EgregoreError::InvalidTransition {
                from: self.state.as_str(),
                to: to.as_str(),
            });
        }
        tracing::info!(from = %self.state, to = %to, "daemon state");
        self.state = to;
        Ok(())
    }
}
