//! In-memory model of a tracked job and the results it can end with.
//!
//! [`Job::observe`] is the only place status responses are folded into
//! job state. It is transport-free, so every lifecycle rule can be tested
//! without a timer or a network.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::TransitionError;
use crate::types::status::JobStatus;
use crate::types::wire::{ModelSummary, RemoteStatus, StatusResponse};

/// Message shown before the first status response arrives.
pub const INITIAL_MESSAGE: &str = "Initializing...";

/// Message carried by every connection-error result.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error";

/// Formats elapsed seconds the way the service does (`12.35s`).
///
/// ```
/// assert_eq!(jobwatch::format_elapsed(12.345), "12.35s");
/// ```
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.2}s")
}

/// A single tracked computation.
#[derive(Debug, Clone)]
pub struct Job {
    task_handle: String,
    job_key: String,
    status: JobStatus,
    progress_percent: u8,
    message: Option<String>,
    current_epoch: Option<u32>,
    total_epochs: Option<u32>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

/// What a single status response did to a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Still running; carries the merged state.
    Progress(ProgressUpdate),
    /// The job reached a terminal state.
    Terminal(TerminalResult),
    /// The response carried a status the client does not know.
    Unrecognized,
}

/// Snapshot of a non-terminal job handed to progress subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Task being observed.
    pub task_handle: String,
    /// Subject of the job.
    pub job_key: String,
    /// `pending` or `in_progress`.
    pub status: JobStatus,
    /// 0..=100.
    pub progress_percent: u8,
    /// Latest message, if any was ever reported.
    pub message: Option<String>,
    /// Latest epoch reported.
    pub current_epoch: Option<u32>,
    /// Planned epochs.
    pub total_epochs: Option<u32>,
}

/// Payload of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSuccess {
    /// Human-readable elapsed time.
    pub elapsed: String,
    /// Elapsed seconds when the service measured them.
    pub elapsed_secs: Option<f64>,
    /// Where the artifact was written.
    pub model_path: Option<String>,
    /// Architecture summary.
    pub model_summary: Option<ModelSummary>,
    /// Worker message.
    pub message: Option<String>,
}

/// How a tracked job ended. Delivered exactly once per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TerminalResult {
    /// The service finished the job.
    Completed(JobSuccess),
    /// The service reported a failure; `error` is verbatim.
    Failed {
        /// Service-supplied error text.
        error: String,
    },
    /// The user stopped monitoring. Not an error.
    Cancelled,
    /// A status query could not be completed.
    ConnectionError {
        /// Generic, user-facing message.
        message: String,
        /// Underlying failure, for logs.
        detail: String,
    },
}

impl TerminalResult {
    /// Builds a connection-error result around a transport failure.
    pub fn connection_error(detail: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: CONNECTION_ERROR_MESSAGE.to_string(),
            detail: detail.into(),
        }
    }

    /// Terminal status this result corresponds to.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Completed(_) => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
            Self::Cancelled => JobStatus::Cancelled,
            Self::ConnectionError { .. } => JobStatus::ConnectionError,
        }
    }

    /// Returns `true` only for a completed job.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Message to show the user. Cancellation shows nothing.
    ///
    /// ```
    /// use jobwatch::TerminalResult;
    ///
    /// let failed = TerminalResult::Failed { error: "out of memory".to_string() };
    /// assert_eq!(failed.message().as_deref(), Some("Training failed: out of memory"));
    /// assert_eq!(TerminalResult::Cancelled.message(), None);
    /// ```
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Completed(success) => Some(format!(
                "Training completed successfully in {}",
                success.elapsed
            )),
            Self::Failed { error } => Some(format!("Training failed: {error}")),
            Self::Cancelled => None,
            Self::ConnectionError { .. } => Some("Error checking training status".to_string()),
        }
    }
}

impl Job {
    /// Starts tracking a job at the moment of first observation.
    pub fn new(task_handle: impl Into<String>, job_key: impl Into<String>) -> Self {
        Self {
            task_handle: task_handle.into(),
            job_key: job_key.into(),
            status: JobStatus::Pending,
            progress_percent: 0,
            message: Some(INITIAL_MESSAGE.to_string()),
            current_epoch: None,
            total_epochs: None,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    /// Opaque handle assigned by the service.
    pub fn task_handle(&self) -> &str {
        &self.task_handle
    }

    /// Subject of the job.
    pub fn job_key(&self) -> &str {
        &self.job_key
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Current progress, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    /// Latest message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Wall-clock time tracking began.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at_utc
    }

    /// Current state as a progress snapshot.
    pub fn snapshot(&self) -> ProgressUpdate {
        ProgressUpdate {
            task_handle: self.task_handle.clone(),
            job_key: self.job_key.clone(),
            status: self.status,
            progress_percent: self.progress_percent,
            message: self.message.clone(),
            current_epoch: self.current_epoch,
            total_epochs: self.total_epochs,
        }
    }

    /// Folds one status response into the job.
    ///
    /// Fields missing from a non-terminal response keep their previous
    /// value. A decreasing progress value is applied as reported.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the job is already terminal; the
    /// response is discarded and the job is left untouched.
    pub fn observe(&mut self, response: &StatusResponse) -> Result<Observation, TransitionError> {
        let next = match response.status {
            RemoteStatus::Pending => JobStatus::Pending,
            RemoteStatus::InProgress => JobStatus::InProgress,
            RemoteStatus::Completed => match response.result.as_ref().and_then(|r| r.embedded_error()) {
                Some(_) => JobStatus::Failed,
                None => JobStatus::Completed,
            },
            RemoteStatus::Failed => JobStatus::Failed,
            RemoteStatus::Unknown => {
                if self.status.is_terminal() {
                    return Err(TransitionError {
                        task_handle: self.task_handle.clone(),
                        from: self.status,
                        to: self.status,
                    });
                }
                return Ok(Observation::Unrecognized);
            },
        };
        self.status.validate_transition(&self.task_handle, &next)?;
        self.status = next;

        match next {
            JobStatus::Pending | JobStatus::InProgress => {
                self.merge_progress(response);
                Ok(Observation::Progress(self.snapshot()))
            },
            JobStatus::Completed => Ok(Observation::Terminal(self.complete(response))),
            _ => Ok(Observation::Terminal(self.fail(response))),
        }
    }

    /// Ends the job because its status could not be queried.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the job is already terminal.
    pub fn lose_connection(
        &mut self,
        detail: impl Into<String>,
    ) -> Result<TerminalResult, TransitionError> {
        self.status
            .validate_transition(&self.task_handle, &JobStatus::ConnectionError)?;
        self.status = JobStatus::ConnectionError;
        let terminal = TerminalResult::connection_error(detail);
        self.message = terminal.message();
        Ok(terminal)
    }

    fn merge_progress(&mut self, response: &StatusResponse) {
        if let Some(percent) = response.progress.and_then(clamp_percent) {
            self.progress_percent = percent;
        }
        if let Some(message) = &response.message {
            self.message = Some(message.clone());
        }
        if let Some(epoch) = response.current_epoch {
            self.current_epoch = Some(epoch);
        }
        if let Some(total) = response.total_epochs {
            self.total_epochs = Some(total);
        }
    }

    fn complete(&mut self, response: &StatusResponse) -> TerminalResult {
        self.progress_percent = 100;
        let result = response.result.clone().unwrap_or_default();
        let elapsed = result
            .elapsed_time_formatted
            .clone()
            .or_else(|| result.elapsed_time.map(format_elapsed))
            .unwrap_or_else(|| format_elapsed(self.started_at.elapsed().as_secs_f64()));

        let success = JobSuccess {
            elapsed,
            elapsed_secs: result.elapsed_time,
            model_path: result.model_path,
            model_summary: result.model_summary,
            message: result.message,
        };
        let terminal = TerminalResult::Completed(success);
        self.message = terminal.message();
        self.current_epoch = None;
        self.total_epochs = None;
        terminal
    }

    fn fail(&mut self, response: &StatusResponse) -> TerminalResult {
        let error = response
            .error
            .clone()
            .or_else(|| response.result.as_ref().and_then(|r| r.embedded_error()))
            .unwrap_or_else(|| "Unknown error".to_string());
        let terminal = TerminalResult::Failed { error };
        self.message = terminal.message();
        self.current_epoch = None;
        self.total_epochs = None;
        terminal
    }
}

/// Rounds a reported percentage into 0..=100; non-finite values are ignored.
fn clamp_percent(value: f64) -> Option<u8> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::wire::TrainingResult;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn in_progress(progress: f64) -> StatusResponse {
        StatusResponse {
            progress: Some(progress),
            ..StatusResponse::new(RemoteStatus::InProgress)
        }
    }

    #[test]
    fn new_job_is_pending_and_initializing() {
        let job = Job::new("t1", "AAPL");
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress_percent(), 0);
        assert_eq!(job.message(), Some(INITIAL_MESSAGE));
    }

    #[test]
    fn missing_fields_keep_previous_values() {
        let mut job = Job::new("t1", "AAPL");
        let first = StatusResponse {
            progress: Some(24.0),
            message: Some("Epoch 12/50".to_string()),
            current_epoch: Some(12),
            total_epochs: Some(50),
            ..StatusResponse::new(RemoteStatus::InProgress)
        };
        job.observe(&first).unwrap();

        let Observation::Progress(update) = job
            .observe(&StatusResponse::new(RemoteStatus::InProgress))
            .unwrap()
        else {
            panic!("expected progress");
        };
        assert_eq!(update.progress_percent, 24);
        assert_eq!(update.message.as_deref(), Some("Epoch 12/50"));
        assert_eq!(update.current_epoch, Some(12));
        assert_eq!(update.total_epochs, Some(50));
    }

    #[test]
    fn in_progress_may_precede_pending() {
        let mut job = Job::new("t1", "AAPL");
        job.observe(&in_progress(10.0)).unwrap();
        let obs = job
            .observe(&StatusResponse::new(RemoteStatus::Pending))
            .unwrap();
        assert!(matches!(obs, Observation::Progress(ref u) if u.status == JobStatus::Pending));
        assert_eq!(job.progress_percent(), 10);
    }

    #[test]
    fn progress_decrease_is_applied_without_panic() {
        let mut job = Job::new("t1", "AAPL");
        job.observe(&in_progress(60.0)).unwrap();
        job.observe(&in_progress(40.0)).unwrap();
        assert_eq!(job.progress_percent(), 40);
    }

    #[test]
    fn progress_is_rounded_and_clamped() {
        let mut job = Job::new("t1", "AAPL");
        job.observe(&in_progress(33.6)).unwrap();
        assert_eq!(job.progress_percent(), 34);
        job.observe(&in_progress(250.0)).unwrap();
        assert_eq!(job.progress_percent(), 100);
        job.observe(&in_progress(-5.0)).unwrap();
        assert_eq!(job.progress_percent(), 0);
    }

    #[test]
    fn completed_forces_full_progress_and_prefers_service_elapsed() {
        let mut job = Job::new("t1", "AAPL");
        job.observe(&in_progress(40.0)).unwrap();
        let done = StatusResponse {
            result: Some(TrainingResult {
                elapsed_time_formatted: Some("12.3s".to_string()),
                ..Default::default()
            }),
            ..StatusResponse::new(RemoteStatus::Completed)
        };
        let Observation::Terminal(TerminalResult::Completed(success)) = job.observe(&done).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(success.elapsed, "12.3s");
        assert_eq!(job.progress_percent(), 100);
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn completed_falls_back_to_service_seconds() {
        let mut job = Job::new("t1", "AAPL");
        let done = StatusResponse {
            result: Some(TrainingResult {
                elapsed_time: Some(7.0),
                ..Default::default()
            }),
            ..StatusResponse::new(RemoteStatus::Completed)
        };
        let Observation::Terminal(TerminalResult::Completed(success)) = job.observe(&done).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(success.elapsed, "7.00s");
        assert_eq!(success.elapsed_secs, Some(7.0));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_without_elapsed_derives_from_start() {
        let mut job = Job::new("t1", "AAPL");
        tokio::time::advance(Duration::from_millis(4_500)).await;
        let Observation::Terminal(TerminalResult::Completed(success)) = job
            .observe(&StatusResponse::new(RemoteStatus::Completed))
            .unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(success.elapsed, "4.50s");
    }

    #[test]
    fn completed_with_embedded_error_is_a_failure() {
        let mut job = Job::new("t1", "ZZZZ");
        let done = StatusResponse {
            result: Some(TrainingResult {
                status: Some("error".to_string()),
                message: Some("No data downloaded".to_string()),
                ..Default::default()
            }),
            ..StatusResponse::new(RemoteStatus::Completed)
        };
        let obs = job.observe(&done).unwrap();
        assert_eq!(
            obs,
            Observation::Terminal(TerminalResult::Failed {
                error: "No data downloaded".to_string()
            })
        );
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn failed_uses_service_error_verbatim() {
        let mut job = Job::new("t1", "AAPL");
        let failed = StatusResponse {
            error: Some("ValueError('bad shape')".to_string()),
            ..StatusResponse::new(RemoteStatus::Failed)
        };
        let obs = job.observe(&failed).unwrap();
        assert_eq!(
            obs,
            Observation::Terminal(TerminalResult::Failed {
                error: "ValueError('bad shape')".to_string()
            })
        );
    }

    #[test]
    fn terminal_job_rejects_further_observations() {
        let mut job = Job::new("t1", "AAPL");
        job.observe(&StatusResponse::new(RemoteStatus::Failed))
            .unwrap();
        assert!(job.observe(&in_progress(50.0)).is_err());
        assert!(job
            .observe(&StatusResponse::new(RemoteStatus::Unknown))
            .is_err());
        assert!(job.lose_connection("late").is_err());
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn unknown_status_changes_nothing() {
        let mut job = Job::new("t1", "AAPL");
        job.observe(&in_progress(20.0)).unwrap();
        let obs = job
            .observe(&StatusResponse::new(RemoteStatus::Unknown))
            .unwrap();
        assert_eq!(obs, Observation::Unrecognized);
        assert_eq!(job.status(), JobStatus::InProgress);
        assert_eq!(job.progress_percent(), 20);
    }

    #[test]
    fn lost_connection_is_terminal() {
        let mut job = Job::new("t1", "AAPL");
        let result = job.lose_connection("timed out").unwrap();
        assert_eq!(result.status(), JobStatus::ConnectionError);
        assert_eq!(
            result,
            TerminalResult::ConnectionError {
                message: CONNECTION_ERROR_MESSAGE.to_string(),
                detail: "timed out".to_string(),
            }
        );
    }

    #[test]
    fn terminal_result_serializes_with_status_tag() {
        let json = serde_json::to_value(TerminalResult::Cancelled).unwrap();
        assert_eq!(json["status"], "cancelled");
    }
}
