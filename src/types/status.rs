//! Job lifecycle state machine.
//!
//! # State Machine
//!
//! ```text
//! Pending    -> Pending, InProgress, Completed, Failed, Cancelled, ConnectionError
//! InProgress -> Pending, InProgress, Completed, Failed, Cancelled, ConnectionError
//! Completed, Failed, Cancelled, ConnectionError -> (terminal, no transitions)
//! ```
//!
//! `Pending` and `InProgress` are not ordered: a status query may observe
//! either one depending on server timing, and observing the same
//! non-terminal status twice is a legal no-op. `Cancelled` and
//! `ConnectionError` are assigned locally by the client; the service never
//! reports them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionError;

/// Lifecycle status of a tracked job.
///
/// # Examples
///
/// ```
/// use jobwatch::JobStatus;
///
/// let status = JobStatus::InProgress;
/// assert!(!status.is_terminal());
/// assert!(status.can_transition_to(&JobStatus::Pending));
/// assert!(!JobStatus::Completed.can_transition_to(&JobStatus::InProgress));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the service, not yet picked up by a worker.
    Pending,
    /// Running remotely.
    InProgress,
    /// Finished successfully (terminal).
    Completed,
    /// The service reported a failure (terminal).
    Failed,
    /// The user stopped monitoring (terminal, client-local).
    Cancelled,
    /// A status query could not be completed (terminal, client-local).
    ConnectionError,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ConnectionError => write!(f, "connection_error"),
        }
    }
}

impl JobStatus {
    /// Every status, in declaration order.
    pub const ALL: [JobStatus; 6] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::ConnectionError,
    ];

    /// Returns `true` for absorbing states.
    ///
    /// ```
    /// use jobwatch::JobStatus;
    ///
    /// assert!(!JobStatus::Pending.is_terminal());
    /// assert!(JobStatus::ConnectionError.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::ConnectionError
        )
    }

    /// Returns `true` for statuses only the client assigns.
    pub fn is_client_local(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ConnectionError)
    }

    /// Returns `true` if moving from this status to `next` is legal.
    ///
    /// Any non-terminal status may move anywhere, including back to itself
    /// or to the other non-terminal status. Terminal statuses reject every
    /// transition.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match self {
            Self::Pending | Self::InProgress => matches!(
                next,
                Self::Pending
                    | Self::InProgress
                    | Self::Completed
                    | Self::Failed
                    | Self::Cancelled
                    | Self::ConnectionError
            ),
            Self::Completed | Self::Failed | Self::Cancelled | Self::ConnectionError => false,
        }
    }

    /// Validates a transition, returning a [`TransitionError`] naming the
    /// task when it is rejected.
    ///
    /// ```
    /// use jobwatch::JobStatus;
    ///
    /// assert!(JobStatus::Pending
    ///     .validate_transition("t1", &JobStatus::Completed)
    ///     .is_ok());
    /// assert!(JobStatus::Failed
    ///     .validate_transition("t1", &JobStatus::Pending)
    ///     .is_err());
    /// ```
    pub fn validate_transition(
        &self,
        task_handle: &str,
        next: &Self,
    ) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError {
                task_handle: task_handle.to_string(),
                from: *self,
                to: *next,
            })
        }
    }
}
