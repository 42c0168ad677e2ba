//! The facade a hosting interface talks to.
//!
//! A [`JobMonitor`] ties together the [`JobLauncher`], the [`Poller`] and
//! the [`Reconciler`] over one [`JobService`] and one [`TaskRegistry`]. It
//! tracks at most one job at a time.
//!
//! # Examples
//!
//! ```no_run
//! use jobwatch::{JobMonitor, MonitorConfig};
//!
//! # async fn example() -> jobwatch::Result<()> {
//! let monitor = JobMonitor::from_config(&MonitorConfig::default())?;
//! monitor.on_progress(|update| println!("{}%", update.progress_percent));
//! monitor.on_terminal(|_, result| println!("{:?}", result.message()));
//!
//! if monitor.init().await?.is_none() {
//!     monitor.start("AAPL").await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::JobService;
use crate::error::{LaunchError, RegistryError, ServiceError};
use crate::launcher::JobLauncher;
use crate::poller::{PollObserver, Poller};
use crate::reconciler::Reconciler;
use crate::registry::{RegistryEntry, TaskRegistry};
use crate::types::job::{ProgressUpdate, TerminalResult};
use crate::types::wire::Artifact;

/// Cloneable handle to a job monitor. Clones share all state.
///
/// When the last clone is dropped, polling stops without a terminal signal
/// and the registry entry is kept, so the next monitor resumes the job.
#[derive(Clone)]
pub struct JobMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    registry: Arc<dyn TaskRegistry>,
    service: Arc<dyn JobService>,
    launcher: JobLauncher,
    poller: Poller,
    reconciler: Arc<Reconciler>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.reconciler.take_active() {
            info!(task = %handle.entry().task_handle, "Monitor dropped, polling stopped");
        }
    }
}

impl std::fmt::Debug for JobMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobMonitor")
            .field("poller", &self.inner.poller)
            .field("reconciler", &self.inner.reconciler)
            .finish_non_exhaustive()
    }
}

impl JobMonitor {
    /// Creates an idle monitor.
    pub fn new(
        service: Arc<dyn JobService>,
        registry: Arc<dyn TaskRegistry>,
        poll_interval: Duration,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&service),
        ));
        Self {
            inner: Arc::new(MonitorInner {
                launcher: JobLauncher::new(Arc::clone(&service), Arc::clone(&registry)),
                poller: Poller::new(Arc::clone(&service), poll_interval),
                reconciler,
                registry,
                service,
            }),
        }
    }

    /// HTTP service and file registry as described by `config`.
    #[cfg(feature = "http-client")]
    pub fn from_config(config: &crate::MonitorConfig) -> crate::Result<Self> {
        config.validate()?;
        let service = crate::client::HttpJobService::from_config(config)?;
        Ok(Self::new(
            Arc::new(service),
            Arc::new(config.file_registry()),
            config.poll_interval(),
        ))
    }

    /// Reload reconciliation: resumes polling the job left in the registry.
    ///
    /// Returns the resumed entry, or `None` when starting idle. The start
    /// operation is never invoked. A corrupt registry record is logged and
    /// cleared. Calling `init` while already tracking returns the tracked
    /// entry without starting a second poll.
    pub async fn init(&self) -> Result<Option<RegistryEntry>, RegistryError> {
        if let Some(entry) = self.active_entry() {
            return Ok(Some(entry));
        }
        let entry = match self.inner.registry.load().await {
            Ok(entry) => entry,
            Err(RegistryError::Corrupt(reason)) => {
                warn!(%reason, "Discarding corrupt registry record");
                self.inner.registry.clear().await?;
                None
            },
            Err(e) => return Err(e),
        };
        match entry {
            Some(entry) => {
                info!(task = %entry.task_handle, job_key = %entry.job_key, "Resuming job from registry");
                self.track(entry.clone());
                Ok(Some(entry))
            },
            None => Ok(None),
        }
    }

    /// Starts a job and begins polling it.
    pub async fn start(&self, job_key: &str) -> Result<RegistryEntry, LaunchError> {
        if let Some(active) = self.active_entry() {
            return Err(LaunchError::AlreadyTracking {
                task_handle: active.task_handle,
                job_key: active.job_key,
            });
        }
        let entry = self.inner.launcher.start_job(job_key).await?;
        self.track(entry.clone());
        Ok(entry)
    }

    fn track(&self, entry: RegistryEntry) {
        let poller = &self.inner.poller;
        let observer: Arc<dyn PollObserver> = self.inner.reconciler.clone();
        self.inner
            .reconciler
            .track(entry, |entry| poller.start(entry, observer));
    }

    /// Subscribes to progress snapshots.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.inner.reconciler.subscribe_progress(Arc::new(callback));
    }

    /// Subscribes to terminal results.
    pub fn on_terminal<F>(&self, callback: F)
    where
        F: Fn(&RegistryEntry, &TerminalResult) + Send + Sync + 'static,
    {
        self.inner.reconciler.subscribe_terminal(Arc::new(callback));
    }

    /// Stops monitoring the tracked job.
    ///
    /// Tracking state is released before this first awaits. Terminal
    /// subscribers then receive [`TerminalResult::Cancelled`] and the
    /// registry entry is removed. The job keeps running on the service.
    /// Returns `false` when nothing was tracked.
    pub async fn cancel(&self) -> bool {
        match self.inner.reconciler.take_active() {
            Some(handle) => handle.cancel().await,
            None => false,
        }
    }

    /// Stops polling without a terminal signal and keeps the registry entry.
    ///
    /// A response still in flight is discarded. Returns `None` when nothing
    /// was tracked or the job had already ended, in which case its terminal
    /// result is delivered as usual.
    pub fn detach(&self) -> Option<RegistryEntry> {
        let handle = self.inner.reconciler.take_active()?;
        let entry = handle.entry().clone();
        if !handle.detach() {
            debug!(task = %entry.task_handle, "Job already ended, nothing to detach");
            return None;
        }
        info!(task = %entry.task_handle, "Detached; job stays registered");
        Some(entry)
    }

    /// Returns `true` while a job is tracked.
    pub fn is_tracking(&self) -> bool {
        self.inner.reconciler.is_tracking()
    }

    /// Latest progress of the tracked job.
    pub fn snapshot(&self) -> Option<ProgressUpdate> {
        self.inner.reconciler.snapshot()
    }

    /// How the most recent job ended.
    pub fn last_result(&self) -> Option<TerminalResult> {
        self.inner.reconciler.last_result()
    }

    /// Entry of the tracked job.
    pub fn active_entry(&self) -> Option<RegistryEntry> {
        self.inner.reconciler.active_entry()
    }

    /// Cached artifact list.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.inner.reconciler.artifacts()
    }

    /// Fetches the artifact list from the service.
    pub async fn refresh_artifacts(&self) -> Result<Vec<Artifact>, ServiceError> {
        self.inner.reconciler.refresh_artifacts().await
    }

    /// The job service in use.
    pub fn service(&self) -> &Arc<dyn JobService> {
        &self.inner.service
    }

    /// The registry in use.
    pub fn registry(&self) -> &Arc<dyn TaskRegistry> {
        &self.inner.registry
    }
}
