//! Wire types exchanged with the remote job service.
//!
//! Field names follow the service's snake_case JSON. Every optional field
//! tolerates both absence and `null`. Shapes are deliberately lenient: an
//! unrecognised status or a malformed embedded result must not turn a
//! successful status query into a connection error.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of the start request.
#[derive(Debug, Clone, Serialize)]
pub struct StartRequest<'a> {
    /// Subject of the job (a ticker symbol).
    pub ticker: &'a str,
}

/// Response to a start request.
///
/// Either `task_id` is set, or `error` explains why nothing was started.
///
/// ```
/// use jobwatch::StartResponse;
///
/// let resp: StartResponse = serde_json::from_str(
///     r#"{"status":"training_started","task_id":"t1","ticker":"AAPL"}"#,
/// ).unwrap();
/// assert_eq!(resp.task_id.as_deref(), Some("t1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    /// Opaque task handle.
    #[serde(default, alias = "taskHandle", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Job key as normalised by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,

    /// Service-side acknowledgement (`training_started`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Human-readable acknowledgement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Inline rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status as reported by the service.
///
/// Anything the client does not recognise deserializes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Queued, not yet running.
    Pending,
    /// Running.
    InProgress,
    /// Finished; `result` is present.
    Completed,
    /// Failed; `error` is present.
    Failed,
    /// Any other status string.
    #[serde(other)]
    Unknown,
}

/// Response to a status query.
///
/// ```
/// use jobwatch::{RemoteStatus, StatusResponse};
///
/// let resp: StatusResponse = serde_json::from_str(
///     r#"{"status":"in_progress","progress":40,"message":"Epoch 20/50"}"#,
/// ).unwrap();
/// assert_eq!(resp.status, RemoteStatus::InProgress);
/// assert_eq!(resp.progress, Some(40.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Reported lifecycle status.
    pub status: RemoteStatus,

    /// Percent complete. A JSON number; may be fractional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    /// Progress or status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Epoch currently running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_epoch: Option<u32>,

    /// Epochs planned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_epochs: Option<u32>,

    /// Result payload, only with `completed`.
    #[serde(
        default,
        deserialize_with = "lenient_result",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<TrainingResult>,

    /// Failure description, only with `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    /// A bare response with only a status.
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            progress: None,
            message: None,
            current_epoch: None,
            total_epochs: None,
            result: None,
            error: None,
        }
    }
}

fn lenient_result<'de, D>(deserializer: D) -> Result<Option<TrainingResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

/// Result of a completed training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// `success`, or `error` when the worker caught an exception and
    /// returned it as a value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Worker message; the error text when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Where the trained artifact was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,

    /// Elapsed seconds measured by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,

    /// Elapsed time already formatted by the worker.
    #[serde(default, alias = "elapsed", skip_serializing_if = "Option::is_none")]
    pub elapsed_time_formatted: Option<String>,

    /// Architecture summary of the trained model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_summary: Option<ModelSummary>,
}

impl TrainingResult {
    /// Returns the embedded error message when the worker reported failure
    /// inside a completed result.
    pub fn embedded_error(&self) -> Option<String> {
        match self.status.as_deref() {
            Some("error") => Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            _ => None,
        }
    }
}

/// Architecture summary of a trained model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Layer-by-layer summary text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_summary: Option<String>,

    /// Total parameter count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_params: Option<u64>,

    /// Trainable parameter count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainable_params: Option<u64>,
}

impl ModelSummary {
    /// Estimated in-memory size assuming float32 weights.
    ///
    /// ```
    /// use jobwatch::ModelSummary;
    ///
    /// let summary = ModelSummary { total_params: Some(1_000), ..Default::default() };
    /// assert_eq!(summary.estimated_size_bytes(), 4_000);
    /// ```
    pub fn estimated_size_bytes(&self) -> u64 {
        self.total_params.unwrap_or(0).saturating_mul(4)
    }

    /// [`estimated_size_bytes`](Self::estimated_size_bytes) in mebibytes.
    pub fn estimated_size_mb(&self) -> f64 {
        self.estimated_size_bytes() as f64 / 1024.0 / 1024.0
    }
}

/// Listing of previously trained artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactList {
    /// `success` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Artifacts, newest first.
    #[serde(default, alias = "items")]
    pub models: Vec<Artifact>,

    /// Number of artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Error description when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ArtifactList {
    /// Returns the reported error when the listing itself failed.
    pub fn reported_error(&self) -> Option<&str> {
        match self.status.as_deref() {
            Some("error") => Some(self.message.as_deref().unwrap_or("Unknown error")),
            _ => None,
        }
    }
}

/// A completed, previously trained artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Job key the artifact was trained for.
    #[serde(alias = "key")]
    pub ticker: String,

    /// Server-side path of the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,

    /// Relative age, e.g. `3 minutes ago`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,

    /// Size in bytes.
    #[serde(default, alias = "size")]
    pub file_size: u64,

    /// Architecture summary, when the service kept one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_summary: Option<ModelSummary>,
}
