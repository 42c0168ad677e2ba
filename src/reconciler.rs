//! Turns poll observations into monitor state and subscriber callbacks.
//!
//! The [`Reconciler`] is the [`PollObserver`] behind every poll started by a
//! [`JobMonitor`](crate::JobMonitor). It owns the tracking slot, the latest
//! progress snapshot, the last terminal result and the artifact cache.
//!
//! On a terminal signal it, in order:
//!
//! 1. clears the registry entry for that job (failures are logged),
//! 2. releases the tracking slot,
//! 3. refreshes the artifact list, on success only (failures are logged),
//! 4. notifies terminal subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client::JobService;
use crate::error::ServiceError;
use crate::poller::{PollHandle, PollObserver};
use crate::registry::{RegistryEntry, TaskRegistry};
use crate::types::job::{Job, ProgressUpdate, TerminalResult};
use crate::types::wire::Artifact;

/// Callback invoked with each progress snapshot.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Callback invoked once per job with its terminal result.
pub type TerminalCallback = Arc<dyn Fn(&RegistryEntry, &TerminalResult) + Send + Sync>;

/// Shared tracking state and result fan-out.
pub struct Reconciler {
    registry: Arc<dyn TaskRegistry>,
    service: Arc<dyn JobService>,
    active: Mutex<Option<PollHandle>>,
    snapshot: RwLock<Option<ProgressUpdate>>,
    last_result: RwLock<Option<TerminalResult>>,
    artifacts: RwLock<Vec<Artifact>>,
    progress_subscribers: RwLock<Vec<ProgressCallback>>,
    terminal_subscribers: RwLock<Vec<TerminalCallback>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("active", &self.active_entry())
            .field("snapshot", &*self.snapshot.read())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates an idle reconciler.
    pub fn new(registry: Arc<dyn TaskRegistry>, service: Arc<dyn JobService>) -> Self {
        Self {
            registry,
            service,
            active: Mutex::new(None),
            snapshot: RwLock::new(None),
            last_result: RwLock::new(None),
            artifacts: RwLock::new(Vec::new()),
            progress_subscribers: RwLock::new(Vec::new()),
            terminal_subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Adds a progress subscriber.
    pub fn subscribe_progress(&self, callback: ProgressCallback) {
        self.progress_subscribers.write().push(callback);
    }

    /// Adds a terminal subscriber.
    pub fn subscribe_terminal(&self, callback: TerminalCallback) {
        self.terminal_subscribers.write().push(callback);
    }

    /// Starts tracking `entry` with the handle produced by `start`.
    ///
    /// The slot stays locked while the poll is spawned, so a terminal
    /// signal racing the install cannot be lost.
    pub fn track(&self, entry: RegistryEntry, start: impl FnOnce(RegistryEntry) -> PollHandle) {
        let mut active = self.active.lock();
        *self.snapshot.write() = Some(Job::new(&entry.task_handle, &entry.job_key).snapshot());
        *self.last_result.write() = None;
        let previous = active.replace(start(entry));
        drop(active);
        drop(previous);
    }

    /// Takes the tracking slot, leaving the monitor idle.
    pub fn take_active(&self) -> Option<PollHandle> {
        let handle = self.active.lock().take();
        if handle.is_some() {
            *self.snapshot.write() = None;
        }
        handle
    }

    /// Returns `true` while a job is tracked.
    pub fn is_tracking(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Entry of the tracked job.
    pub fn active_entry(&self) -> Option<RegistryEntry> {
        self.active.lock().as_ref().map(|handle| handle.entry().clone())
    }

    /// Latest progress of the tracked job.
    pub fn snapshot(&self) -> Option<ProgressUpdate> {
        self.snapshot.read().clone()
    }

    /// How the most recent job ended.
    pub fn last_result(&self) -> Option<TerminalResult> {
        self.last_result.read().clone()
    }

    /// Cached artifact list.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.read().clone()
    }

    /// Fetches the artifact list and replaces the cache.
    pub async fn refresh_artifacts(&self) -> Result<Vec<Artifact>, ServiceError> {
        let list = self.service.artifacts().await?;
        debug!(count = list.models.len(), "Artifacts refreshed");
        *self.artifacts.write() = list.models.clone();
        Ok(list.models)
    }

    fn release(&self, task_handle: &str) -> Option<PollHandle> {
        let mut active = self.active.lock();
        let owns_slot = active
            .as_ref()
            .is_some_and(|handle| handle.entry().task_handle == task_handle);
        if owns_slot {
            *self.snapshot.write() = None;
            active.take()
        } else {
            None
        }
    }

    /// Clears the registry unless it now holds a different job.
    async fn clear_registry(&self, entry: &RegistryEntry) {
        match self.registry.load().await {
            Ok(Some(stored)) if stored.task_handle != entry.task_handle => {
                debug!(task = %entry.task_handle, stored = %stored.task_handle, "Registry holds another job, not clearing");
                return;
            },
            Ok(_) => {},
            Err(e) => warn!(task = %entry.task_handle, error = %e, "Could not read registry, clearing anyway"),
        }
        if let Err(e) = self.registry.clear().await {
            warn!(task = %entry.task_handle, error = %e, "Failed to clear task registry");
        }
    }
}

#[async_trait]
impl PollObserver for Reconciler {
    fn on_update(&self, update: &ProgressUpdate) {
        {
            let active = self.active.lock();
            let owns_slot = active
                .as_ref()
                .is_some_and(|handle| handle.entry().task_handle == update.task_handle);
            if !owns_slot {
                debug!(task = %update.task_handle, "Dropping update for untracked job");
                return;
            }
            *self.snapshot.write() = Some(update.clone());
        }
        let subscribers = self.progress_subscribers.read().clone();
        for callback in subscribers {
            callback(update);
        }
    }

    async fn on_terminal(&self, entry: &RegistryEntry, result: TerminalResult) {
        self.clear_registry(entry).await;
        drop(self.release(&entry.task_handle));

        if result.is_success() {
            if let Err(e) = self.refresh_artifacts().await {
                warn!(error = %e, "Artifact refresh after completion failed");
            }
        }

        info!(task = %entry.task_handle, status = %result.status(), "Tracking released");
        *self.last_result.write() = Some(result.clone());
        let subscribers = self.terminal_subscribers.read().clone();
        for callback in subscribers {
            callback(entry, &result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::Poller;
    use crate::registry::InMemoryRegistry;
    use crate::types::wire::{ArtifactList, StartResponse, StatusResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Never answers a status query.
    struct Silent;

    #[async_trait]
    impl JobService for Silent {
        async fn start(&self, _job_key: &str) -> Result<StartResponse, ServiceError> {
            Err(ServiceError::Transport("not used".to_string()))
        }

        async fn status(&self, _task_handle: &str) -> Result<StatusResponse, ServiceError> {
            std::future::pending().await
        }

        async fn artifacts(&self) -> Result<ArtifactList, ServiceError> {
            Ok(ArtifactList::default())
        }
    }

    #[tokio::test]
    async fn updates_for_untracked_jobs_are_dropped() {
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(InMemoryRegistry::new()),
            Arc::new(Silent),
        ));
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            reconciler.subscribe_progress(Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let stale = Job::new("old", "AAPL").snapshot();
        reconciler.on_update(&stale);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(reconciler.snapshot().is_none());

        let poller = Poller::new(Arc::new(Silent), Duration::from_secs(60));
        let observer: Arc<dyn PollObserver> = reconciler.clone();
        reconciler.track(RegistryEntry::new("t1", "AAPL"), |entry| {
            poller.start(entry, observer)
        });

        reconciler.on_update(&stale);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(reconciler.snapshot().unwrap().task_handle, "t1");

        reconciler.on_update(&Job::new("t1", "AAPL").snapshot());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let handle = reconciler.take_active().unwrap();
        assert!(handle.detach());
        reconciler.on_update(&Job::new("t1", "AAPL").snapshot());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
