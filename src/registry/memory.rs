//! In-process task registry.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{RegistryEntry, TaskRegistry};
use crate::error::RegistryError;

/// Registry kept in shared memory.
///
/// Clones share the same slot, so a second monitor built over a clone sees
/// what the first one wrote. That is how tests simulate a reload.
///
/// # Examples
///
/// ```
/// use jobwatch::{InMemoryRegistry, RegistryEntry, TaskRegistry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = InMemoryRegistry::new();
/// let other = registry.clone();
/// registry.save(&RegistryEntry::new("t1", "AAPL")).await.unwrap();
/// assert_eq!(other.load().await.unwrap().unwrap().task_handle, "t1");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    slot: Arc<Mutex<Option<RegistryEntry>>>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry already holding `entry`.
    pub fn with_entry(entry: RegistryEntry) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(entry))),
        }
    }

    /// Returns the stored entry without going through the async trait.
    pub fn peek(&self) -> Option<RegistryEntry> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl TaskRegistry for InMemoryRegistry {
    async fn load(&self) -> Result<Option<RegistryEntry>, RegistryError> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, entry: &RegistryEntry) -> Result<(), RegistryError> {
        *self.slot.lock() = Some(entry.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<bool, RegistryError> {
        Ok(self.slot.lock().take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_replaces_and_clear_is_idempotent() {
        let registry = InMemoryRegistry::new();
        assert!(registry.load().await.unwrap().is_none());

        registry.save(&RegistryEntry::new("t1", "AAPL")).await.unwrap();
        registry.save(&RegistryEntry::new("t2", "TSLA")).await.unwrap();
        assert_eq!(registry.peek().unwrap().task_handle, "t2");

        assert!(registry.clear().await.unwrap());
        assert!(!registry.clear().await.unwrap());
        assert!(registry.peek().is_none());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let registry = InMemoryRegistry::with_entry(RegistryEntry::new("t1", "AAPL"));
        let clone = registry.clone();
        clone.clear().await.unwrap();
        assert!(registry.load().await.unwrap().is_none());
    }
}
