//! Client-side supervision of long-running remote training jobs.
//!
//! A job is started on a remote service, which hands back an opaque task
//! handle. This crate records that handle durably, polls the job's status at
//! a fixed interval, survives a restart of the client without resubmitting,
//! and reports exactly one terminal result per job: completed, failed,
//! cancelled or connection error.
//!
//! # Overview
//!
//! ```text
//! JobLauncher -> TaskRegistry -> Poller -> Job (state machine) -> Reconciler -> subscribers
//! ```
//!
//! On start-up, [`JobMonitor::init`] reads the registry and resumes polling
//! a stored job without calling the start operation again.
//!
//! # Module Organization
//!
//! - [`types`] - Lifecycle status, wire shapes and the in-memory job model
//! - [`registry`] - Durable single-entry task registry (memory and file)
//! - [`client`] - The remote job service trait and its HTTP implementation
//! - [`launcher`] - Job submission
//! - [`poller`] - Periodic status polling with exactly-once terminal delivery
//! - [`reconciler`] - Terminal handling, subscriber fan-out, artifact cache
//! - [`monitor`] - The facade hosting interfaces use
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Error types

pub mod client;
pub mod config;
pub mod error;
pub mod launcher;
#[cfg(feature = "logging")]
pub mod logging;
pub mod monitor;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod types;

// Re-exports for ergonomic access
#[cfg(feature = "http-client")]
pub use client::HttpJobService;
pub use client::JobService;
pub use config::{Endpoints, MonitorConfig};
pub use error::{
    ConfigError, Error, LaunchError, RegistryError, Result, ServiceError, TransitionError,
};
pub use launcher::JobLauncher;
pub use monitor::JobMonitor;
pub use poller::{PollHandle, PollObserver, Poller, TerminalLatch};
pub use reconciler::{ProgressCallback, Reconciler, TerminalCallback};
pub use registry::{FileRegistry, InMemoryRegistry, RegistryEntry, TaskRegistry};
pub use types::*;
