//! Periodic status polling for one job.
//!
//! [`Poller::start`] spawns a task that queries the service immediately and
//! then once per interval. The query is awaited inside the loop, so ticks
//! never overlap and responses are applied in the order they were requested.
//!
//! Every path that ends a job goes through a [`TerminalLatch`]. Whoever
//! fires it first (a terminal response, a failed query, or
//! [`PollHandle::cancel`]) delivers the one terminal signal; everyone else
//! discards what they were holding. That is what keeps a response arriving
//! after cancellation from reviving the job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::JobService;
use crate::registry::RegistryEntry;
use crate::types::job::{Job, Observation, ProgressUpdate, TerminalResult};

/// Receives what a poller observes.
#[async_trait]
pub trait PollObserver: Send + Sync {
    /// Called for each non-terminal response while the terminal latch is
    /// held, so it must not block or cancel the poll. A completed job gets
    /// one last call at 100% just before [`on_terminal`](Self::on_terminal).
    fn on_update(&self, update: &ProgressUpdate);

    /// Called exactly once when the job ends.
    async fn on_terminal(&self, entry: &RegistryEntry, result: TerminalResult);
}

/// One-shot guard around terminal delivery.
///
/// # Examples
///
/// ```
/// use jobwatch::TerminalLatch;
///
/// let latch = TerminalLatch::new();
/// assert!(latch.fire());
/// assert!(!latch.fire());
/// assert_eq!(latch.while_live(|| 1), None);
/// ```
#[derive(Debug, Default)]
pub struct TerminalLatch {
    fired: Mutex<bool>,
}

impl TerminalLatch {
    /// Creates an unfired latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the latch. Returns `true` only for the first caller.
    pub fn fire(&self) -> bool {
        let mut fired = self.fired.lock();
        !std::mem::replace(&mut *fired, true)
    }

    /// Returns `true` once the latch has fired.
    pub fn is_fired(&self) -> bool {
        *self.fired.lock()
    }

    /// Runs `f` only if the latch has not fired, holding it closed meanwhile.
    pub fn while_live<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let fired = self.fired.lock();
        if *fired {
            None
        } else {
            Some(f())
        }
    }
}

/// Spawns polling tasks against a job service.
#[derive(Clone)]
pub struct Poller {
    service: Arc<dyn JobService>,
    interval: Duration,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Default delay between status queries.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Creates a poller. A zero interval is raised to one millisecond.
    pub fn new(service: Arc<dyn JobService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Delay between status queries.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts polling the job in `entry`. Must be called within a Tokio
    /// runtime.
    pub fn start(&self, entry: RegistryEntry, observer: Arc<dyn PollObserver>) -> PollHandle {
        let latch = Arc::new(TerminalLatch::new());
        let token = CancellationToken::new();

        debug!(task = %entry.task_handle, interval_ms = self.interval.as_millis() as u64, "Polling started");
        tokio::spawn(poll_loop(
            Arc::clone(&self.service),
            self.interval,
            entry.clone(),
            Arc::clone(&observer),
            Arc::clone(&latch),
            token.clone(),
        ));

        PollHandle {
            entry,
            observer,
            latch,
            token,
        }
    }
}

async fn poll_loop(
    service: Arc<dyn JobService>,
    interval: Duration,
    entry: RegistryEntry,
    observer: Arc<dyn PollObserver>,
    latch: Arc<TerminalLatch>,
    token: CancellationToken,
) {
    let mut job = Job::new(&entry.task_handle, &entry.job_key);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            _ = ticker.tick() => {},
        }

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return,
            response = service.status(&entry.task_handle) => response,
        };

        let observed = match response {
            Ok(response) => {
                debug!(task = %entry.task_handle, status = ?response.status, progress = ?response.progress, "Status received");
                job.observe(&response).map_err(|e| e.to_string())
            },
            Err(e) => {
                warn!(task = %entry.task_handle, error = %e, "Status query failed");
                job.lose_connection(e.to_string())
                    .map(Observation::Terminal)
                    .map_err(|e| e.to_string())
            },
        };

        match observed {
            Ok(Observation::Progress(update)) => {
                if latch.while_live(|| observer.on_update(&update)).is_none() {
                    debug!(task = %entry.task_handle, "Discarding update after terminal");
                    return;
                }
            },
            Ok(Observation::Unrecognized) => {
                warn!(task = %entry.task_handle, "Unrecognized status, still polling");
            },
            Ok(Observation::Terminal(result)) => {
                if latch.fire() {
                    token.cancel();
                    if result.is_success() {
                        observer.on_update(&job.snapshot());
                    }
                    info!(task = %entry.task_handle, status = %result.status(), "Job reached terminal state");
                    observer.on_terminal(&entry, result).await;
                } else {
                    debug!(task = %entry.task_handle, "Discarding terminal result after cancellation");
                }
                return;
            },
            Err(e) => {
                warn!(task = %entry.task_handle, error = %e, "Ignoring response");
                return;
            },
        }
    }
}

/// Handle to a running poll.
///
/// Dropping the handle stops the timer and closes the latch without a
/// terminal signal, which is what tearing down a view should do. A response
/// still in flight is discarded. Use [`cancel`](Self::cancel) to stop
/// monitoring with a `Cancelled` result.
pub struct PollHandle {
    entry: RegistryEntry,
    observer: Arc<dyn PollObserver>,
    latch: Arc<TerminalLatch>,
    token: CancellationToken,
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("entry", &self.entry)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl PollHandle {
    /// The job being polled.
    pub fn entry(&self) -> &RegistryEntry {
        &self.entry
    }

    /// Returns `true` once the poll can no longer deliver anything.
    pub fn is_finished(&self) -> bool {
        self.latch.is_fired() || self.token.is_cancelled()
    }

    /// Stops monitoring and delivers [`TerminalResult::Cancelled`].
    ///
    /// The timer is stopped and the latch fired before the first await, so
    /// an in-flight response is discarded. The service is not told to abort
    /// the job. Returns `false` if the job had already ended.
    pub async fn cancel(self) -> bool {
        self.token.cancel();
        if !self.latch.fire() {
            return false;
        }
        info!(task = %self.entry.task_handle, "Monitoring cancelled");
        self.observer
            .on_terminal(&self.entry, TerminalResult::Cancelled)
            .await;
        true
    }

    /// Stops polling without a terminal signal.
    ///
    /// Returns `false` if the job had already ended, in which case its
    /// terminal result is being delivered.
    pub fn detach(self) -> bool {
        self.token.cancel();
        self.latch.fire()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
        self.latch.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::types::wire::{ArtifactList, RemoteStatus, StartResponse, StatusResponse};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct Scripted {
        responses: Mutex<VecDeque<Result<StatusResponse, ServiceError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(responses: Vec<Result<StatusResponse, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JobService for Scripted {
        async fn start(&self, _job_key: &str) -> Result<StartResponse, ServiceError> {
            unreachable!("poller never starts jobs")
        }

        async fn status(&self, _task_handle: &str) -> Result<StatusResponse, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusResponse::new(RemoteStatus::Pending)))
        }

        async fn artifacts(&self) -> Result<ArtifactList, ServiceError> {
            Ok(ArtifactList::default())
        }
    }

    #[derive(Debug)]
    enum Event {
        Update(ProgressUpdate),
        Terminal(TerminalResult),
    }

    struct Recorder(mpsc::UnboundedSender<Event>);

    #[async_trait]
    impl PollObserver for Recorder {
        fn on_update(&self, update: &ProgressUpdate) {
            let _ = self.0.send(Event::Update(update.clone()));
        }

        async fn on_terminal(&self, _entry: &RegistryEntry, result: TerminalResult) {
            let _ = self.0.send(Event::Terminal(result));
        }
    }

    fn progress(p: f64) -> Result<StatusResponse, ServiceError> {
        Ok(StatusResponse {
            progress: Some(p),
            ..StatusResponse::new(RemoteStatus::InProgress)
        })
    }

    fn start(service: Arc<Scripted>) -> (PollHandle, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = Poller::new(service, Duration::from_secs(2));
        let handle = poller.start(RegistryEntry::new("t1", "AAPL"), Arc::new(Recorder(tx)));
        (handle, rx)
    }

    #[test]
    fn latch_fires_once() {
        let latch = TerminalLatch::new();
        assert_eq!(latch.while_live(|| 7), Some(7));
        assert!(latch.fire());
        assert!(latch.is_fired());
        assert!(!latch.fire());
    }

    #[tokio::test(start_paused = true)]
    async fn first_query_is_immediate_then_every_interval() {
        let service = Scripted::new(vec![progress(10.0), progress(20.0), progress(30.0)]);
        let (_handle, mut rx) = start(Arc::clone(&service));

        let Some(Event::Update(first)) = rx.recv().await else {
            panic!("expected update");
        };
        assert_eq!(first.progress_percent, 10);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        let Some(Event::Update(second)) = rx.recv().await else {
            panic!("expected update");
        };
        assert_eq!(second.progress_percent, 20);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_stops_polling() {
        let service = Scripted::new(vec![
            progress(50.0),
            Ok(StatusResponse::new(RemoteStatus::Completed)),
        ]);
        let (handle, mut rx) = start(Arc::clone(&service));

        assert!(matches!(rx.recv().await, Some(Event::Update(_))));
        let Some(Event::Update(last)) = rx.recv().await else {
            panic!("expected final update");
        };
        assert_eq!(last.progress_percent, 100);
        assert_eq!(last.status, crate::types::status::JobStatus::Completed);
        let Some(Event::Terminal(result)) = rx.recv().await else {
            panic!("expected terminal");
        };
        assert!(result.is_success());
        assert!(handle.is_finished());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_terminal() {
        let service = Scripted::new(vec![Err(ServiceError::Transport(
            "request timed out".to_string(),
        ))]);
        let (_handle, mut rx) = start(Arc::clone(&service));

        let Some(Event::Terminal(result)) = rx.recv().await else {
            panic!("expected terminal");
        };
        assert!(matches!(result, TerminalResult::ConnectionError { .. }));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_delivers_once_and_stops() {
        let service = Scripted::new(vec![progress(10.0)]);
        let (handle, mut rx) = start(Arc::clone(&service));
        assert!(matches!(rx.recv().await, Some(Event::Update(_))));

        assert!(handle.cancel().await);
        assert!(matches!(
            rx.recv().await,
            Some(Event::Terminal(TerminalResult::Cancelled))
        ));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_without_terminal() {
        let service = Scripted::new(vec![progress(10.0)]);
        let (handle, mut rx) = start(Arc::clone(&service));
        assert!(matches!(rx.recv().await, Some(Event::Update(_))));

        drop(handle);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn detach_closes_the_latch() {
        let service = Scripted::new(vec![progress(10.0)]);
        let (handle, mut rx) = start(Arc::clone(&service));
        assert!(matches!(rx.recv().await, Some(Event::Update(_))));

        let latch = Arc::clone(&handle.latch);
        assert!(handle.detach());
        assert!(latch.is_fired());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sends_no_final_update() {
        let service = Scripted::new(vec![Ok(StatusResponse {
            error: Some("boom".to_string()),
            ..StatusResponse::new(RemoteStatus::Failed)
        })]);
        let (_handle, mut rx) = start(Arc::clone(&service));
        assert!(matches!(
            rx.recv().await,
            Some(Event::Terminal(TerminalResult::Failed { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let service = Scripted::new(vec![
            Ok(StatusResponse::new(RemoteStatus::Unknown)),
            progress(5.0),
        ]);
        let (_handle, mut rx) = start(Arc::clone(&service));
        let Some(Event::Update(update)) = rx.recv().await else {
            panic!("expected update");
        };
        assert_eq!(update.progress_percent, 5);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
