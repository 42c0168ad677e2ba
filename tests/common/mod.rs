//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use jobwatch::{
    Artifact, ArtifactList, JobMonitor, JobService, ProgressUpdate, RegistryEntry, RemoteStatus,
    ServiceError, StartResponse, StatusResponse, TerminalResult,
};

/// One scripted answer to a status query.
pub enum Step {
    Reply(Result<StatusResponse, ServiceError>),
    Delayed(Duration, Result<StatusResponse, ServiceError>),
    /// Holds the worker thread, so cancellation cannot interrupt the query.
    Blocking(Duration, Result<StatusResponse, ServiceError>),
}

/// A [`JobService`] that replays scripted answers and counts calls.
#[derive(Default)]
pub struct ScriptedService {
    starts: Mutex<VecDeque<Result<StartResponse, ServiceError>>>,
    steps: Mutex<VecDeque<Step>>,
    artifacts: Mutex<Option<Result<ArtifactList, ServiceError>>>,
    started_keys: Mutex<Vec<String>>,
    queried_handles: Mutex<Vec<String>>,
    artifact_calls: Mutex<usize>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_start(&self, response: Result<StartResponse, ServiceError>) -> &Self {
        self.starts.lock().push_back(response);
        self
    }

    pub fn accept(&self, task_id: &str, ticker: &str) -> &Self {
        self.on_start(Ok(StartResponse {
            task_id: Some(task_id.to_string()),
            ticker: Some(ticker.to_string()),
            status: Some("training_started".to_string()),
            ..Default::default()
        }))
    }

    pub fn then(&self, step: Step) -> &Self {
        self.steps.lock().push_back(step);
        self
    }

    pub fn reply(&self, response: StatusResponse) -> &Self {
        self.then(Step::Reply(Ok(response)))
    }

    pub fn with_artifacts(&self, result: Result<ArtifactList, ServiceError>) -> &Self {
        *self.artifacts.lock() = Some(result);
        self
    }

    pub fn started_keys(&self) -> Vec<String> {
        self.started_keys.lock().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.queried_handles.lock().len()
    }

    pub fn queried_handles(&self) -> Vec<String> {
        self.queried_handles.lock().clone()
    }

    pub fn artifact_calls(&self) -> usize {
        *self.artifact_calls.lock()
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn start(&self, job_key: &str) -> Result<StartResponse, ServiceError> {
        self.started_keys.lock().push(job_key.to_string());
        self.starts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport("no start scripted".to_string())))
    }

    async fn status(&self, task_handle: &str) -> Result<StatusResponse, ServiceError> {
        self.queried_handles.lock().push(task_handle.to_string());
        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Reply(result)) => result,
            Some(Step::Delayed(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            },
            Some(Step::Blocking(delay, result)) => {
                std::thread::sleep(delay);
                result
            },
            None => Ok(StatusResponse::new(RemoteStatus::Pending)),
        }
    }

    async fn artifacts(&self) -> Result<ArtifactList, ServiceError> {
        *self.artifact_calls.lock() += 1;
        match self.artifacts.lock().take() {
            Some(result) => result,
            None => Ok(ArtifactList::default()),
        }
    }
}

pub fn in_progress(progress: f64) -> StatusResponse {
    StatusResponse {
        progress: Some(progress),
        ..StatusResponse::new(RemoteStatus::InProgress)
    }
}

pub fn artifact(ticker: &str, size: u64) -> Artifact {
    Artifact {
        ticker: ticker.to_string(),
        file_size: size,
        ..Default::default()
    }
}

/// Everything a monitor reported, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress(ProgressUpdate),
    Terminal(RegistryEntry, TerminalResult),
}

/// Subscribes to both callbacks and funnels them into one channel.
pub fn record(monitor: &JobMonitor) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    let progress_tx = tx.clone();
    monitor.on_progress(move |update| {
        let _ = progress_tx.send(Event::Progress(update.clone()));
    });
    monitor.on_terminal(move |entry, result| {
        let _ = tx.send(Event::Terminal(entry.clone(), result.clone()));
    });
    rx
}

/// Waits for the next terminal event, skipping progress.
pub async fn next_terminal(rx: &mut mpsc::UnboundedReceiver<Event>) -> (RegistryEntry, TerminalResult) {
    loop {
        match rx.recv().await {
            Some(Event::Terminal(entry, result)) => return (entry, result),
            Some(Event::Progress(_)) => continue,
            None => panic!("monitor dropped without a terminal event"),
        }
    }
}

/// Waits for the next progress event.
pub async fn next_progress(rx: &mut mpsc::UnboundedReceiver<Event>) -> ProgressUpdate {
    match rx.recv().await {
        Some(Event::Progress(update)) => update,
        other => panic!("expected progress, got {other:?}"),
    }
}
