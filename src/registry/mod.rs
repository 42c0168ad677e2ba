//! Durable record of the job currently being tracked.
//!
//! The [`TaskRegistry`] trait is a dumb store holding at most one
//! [`RegistryEntry`]. It knows nothing about the job lifecycle: the
//! launcher writes, the reconciler clears, and the monitor reads once at
//! start-up. Backends differ only in where the record lives:
//!
//! - [`InMemoryRegistry`]: shared process memory, for tests and embedding.
//! - [`FileRegistry`]: one JSON file that outlives the process.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

pub use file::FileRegistry;
pub use memory::InMemoryRegistry;

/// Well-known name of the persisted record.
pub const REGISTRY_FILE_NAME: &str = "active_training_task.json";

/// The persisted `{taskHandle, jobKey}` pair.
///
/// # Examples
///
/// ```
/// use jobwatch::RegistryEntry;
///
/// let entry: RegistryEntry =
///     serde_json::from_str(r#"{"taskHandle":"t1","jobKey":"AAPL"}"#).unwrap();
/// assert_eq!(entry.task_handle, "t1");
/// assert!(entry.registered_at.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Opaque handle assigned by the service.
    pub task_handle: String,
    /// Subject of the job.
    pub job_key: String,
    /// When the entry was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(task_handle: impl Into<String>, job_key: impl Into<String>) -> Self {
        Self {
            task_handle: task_handle.into(),
            job_key: job_key.into(),
            registered_at: Some(Utc::now()),
        }
    }
}

/// Storage for the single active-task record.
///
/// Implementations must be safe to share across tasks. `save` replaces any
/// existing record; `clear` is idempotent.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Reads the stored entry, if any.
    async fn load(&self) -> Result<Option<RegistryEntry>, RegistryError>;

    /// Stores `entry`, replacing whatever was there.
    async fn save(&self, entry: &RegistryEntry) -> Result<(), RegistryError>;

    /// Removes the stored entry. Returns `true` if one existed.
    async fn clear(&self) -> Result<bool, RegistryError>;
}
