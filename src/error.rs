//! Error types for job supervision.
//!
//! The taxonomy follows what the hosting interface needs to tell apart:
//!
//! - [`LaunchError`]: the job could not be started; tracking never begins.
//! - [`ServiceError`]: a call to the remote job service failed. During
//!   polling this becomes a terminal connection error rather than a retry.
//! - [`RegistryError`]: the durable task registry could not be read or
//!   written.
//! - [`TransitionError`]: a lifecycle transition out of a terminal state
//!   was attempted.
//! - [`ConfigError`]: configuration could not be loaded or is invalid.
//!
//! Server-reported failures and user cancellation are *not* errors here;
//! they are terminal results (see [`TerminalResult`](crate::TerminalResult)).

use thiserror::Error;

use crate::types::status::JobStatus;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for operations that touch more than one component.
#[derive(Error, Debug)]
pub enum Error {
    /// Starting a job failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The remote job service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The task registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reasons a job could not be started.
///
/// Surfaced inline next to the submission control. No registry entry
/// exists after any of these.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The job key was empty or whitespace.
    #[error("job key must not be empty")]
    EmptyJobKey,

    /// A job is already being tracked by this client.
    #[error("already tracking task {task_handle} for {job_key}")]
    AlreadyTracking {
        /// Handle of the job currently tracked.
        task_handle: String,
        /// Key of the job currently tracked.
        job_key: String,
    },

    /// The service refused the start request.
    #[error("{message}")]
    Rejected {
        /// Human-readable reason from the service.
        message: String,
    },

    /// The service answered without a task handle or an error.
    #[error("service did not return a task handle")]
    MissingHandle,

    /// The request never reached a usable response.
    #[error("could not start job: {0}")]
    Service(#[from] ServiceError),

    /// The handle was obtained but could not be persisted.
    #[error("job {task_handle} started but could not be registered: {source}")]
    Registry {
        /// Handle returned by the service. The job keeps running remotely.
        task_handle: String,
        /// Underlying registry failure.
        #[source]
        source: RegistryError,
    },
}

/// Failures talking to the remote job service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("service returned {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The service answered successfully but reported an error in the body.
    #[error("service reported an error: {0}")]
    Reported(String),

    /// The response body did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failures reading or writing the durable task registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Filesystem failure.
    #[error("registry I/O error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The stored record exists but cannot be parsed.
    #[error("registry record is corrupt: {0}")]
    Corrupt(String),

    /// Background work backing a registry call panicked or was cancelled.
    #[error("registry task failed: {0}")]
    Task(String),
}

/// A lifecycle transition the state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transition from {from} to {to} for task {task_handle}")]
pub struct TransitionError {
    /// Task whose transition was rejected.
    pub task_handle: String,
    /// Current status.
    pub from: JobStatus,
    /// Rejected target status.
    pub to: JobStatus,
}

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("could not read config {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parse failure.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or malformed.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
