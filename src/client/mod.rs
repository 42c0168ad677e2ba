//! The remote job service seen from the client.
//!
//! [`JobService`] is the seam between job supervision and transport. The
//! launcher, poller and reconciler only ever talk to this trait, so tests
//! drive them with scripted doubles and production uses
//! [`HttpJobService`].

#[cfg(feature = "http-client")]
pub mod http;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::wire::{ArtifactList, StartResponse, StatusResponse};

#[cfg(feature = "http-client")]
pub use http::HttpJobService;

/// Operations the remote job service exposes.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submits a job for `job_key`.
    ///
    /// An inline rejection comes back as `Ok` with `error` set; `Err` means
    /// no usable answer was obtained.
    async fn start(&self, job_key: &str) -> Result<StartResponse, ServiceError>;

    /// Queries the status of a previously started job.
    async fn status(&self, task_handle: &str) -> Result<StatusResponse, ServiceError>;

    /// Lists completed artifacts.
    async fn artifacts(&self) -> Result<ArtifactList, ServiceError>;
}
