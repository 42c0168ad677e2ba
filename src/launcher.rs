//! Job submission.
//!
//! The launcher submits a start request and records the returned handle in
//! the task registry. It never starts polling; the caller does that, so
//! submitting and observing can be exercised separately.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::JobService;
use crate::error::{LaunchError, ServiceError};
use crate::registry::{RegistryEntry, TaskRegistry};

/// Submits jobs and registers their handles.
#[derive(Clone)]
pub struct JobLauncher {
    service: Arc<dyn JobService>,
    registry: Arc<dyn TaskRegistry>,
}

impl std::fmt::Debug for JobLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLauncher").finish_non_exhaustive()
    }
}

impl JobLauncher {
    /// Creates a launcher over a service and a registry.
    pub fn new(service: Arc<dyn JobService>, registry: Arc<dyn TaskRegistry>) -> Self {
        Self { service, registry }
    }

    /// Starts a job for `job_key` and returns the registered entry.
    ///
    /// The key is trimmed first. The service's echo of the key is preferred
    /// over the submitted one since the service normalises it.
    ///
    /// # Errors
    ///
    /// - [`LaunchError::EmptyJobKey`] for an empty key.
    /// - [`LaunchError::AlreadyTracking`] when the registry already holds an
    ///   entry. The guard is advisory; two clients can still race.
    /// - [`LaunchError::Rejected`] when the service refuses the request.
    /// - [`LaunchError::Service`] when no usable answer was obtained.
    /// - [`LaunchError::Registry`] when the job started but the handle could
    ///   not be persisted. The job keeps running remotely.
    pub async fn start_job(&self, job_key: &str) -> Result<RegistryEntry, LaunchError> {
        let job_key = job_key.trim();
        if job_key.is_empty() {
            return Err(LaunchError::EmptyJobKey);
        }

        match self.registry.load().await {
            Ok(Some(active)) => {
                return Err(LaunchError::AlreadyTracking {
                    task_handle: active.task_handle,
                    job_key: active.job_key,
                })
            },
            Ok(None) => {},
            Err(e) => warn!(error = %e, "Could not read task registry before launch"),
        }

        let response = self.service.start(job_key).await.map_err(|e| match e {
            ServiceError::Rejected { message, .. } | ServiceError::Reported(message) => {
                LaunchError::Rejected { message }
            },
            other => LaunchError::Service(other),
        })?;

        if let Some(message) = response.error {
            return Err(LaunchError::Rejected { message });
        }
        let task_handle = response
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or(LaunchError::MissingHandle)?;
        let job_key = response
            .ticker
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| job_key.to_string());

        let entry = RegistryEntry::new(task_handle, job_key);
        self.registry
            .save(&entry)
            .await
            .map_err(|source| LaunchError::Registry {
                task_handle: entry.task_handle.clone(),
                source,
            })?;

        info!(task = %entry.task_handle, job_key = %entry.job_key, "Job started");
        Ok(entry)
    }
}
