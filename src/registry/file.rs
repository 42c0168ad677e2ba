//! File-backed task registry.
//!
//! The entry lives in a single JSON document named
//! [`REGISTRY_FILE_NAME`](super::REGISTRY_FILE_NAME). Writes go to a
//! temporary file in the same directory which is then renamed over the
//! target, so a reader never observes a half-written record.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{RegistryEntry, TaskRegistry, REGISTRY_FILE_NAME};
use crate::error::RegistryError;

/// Registry persisted to the local filesystem.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    /// Stores the registry file inside `dir`. The directory is created on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(REGISTRY_FILE_NAME),
        }
    }

    /// Uses the platform data directory (`~/.local/share/jobwatch` on Linux).
    ///
    /// Falls back to the current directory when the platform has none.
    pub fn in_default_dir() -> Self {
        Self::new(default_dir())
    }

    /// Full path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, RegistryError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, RegistryError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || op(&path))
            .await
            .map_err(|e| RegistryError::Task(e.to_string()))?
    }
}

/// Default directory for the registry file.
pub fn default_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobwatch")
}

fn io_error(path: &Path, source: io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_entry(path: &Path) -> Result<Option<RegistryEntry>, RegistryError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| RegistryError::Corrupt(format!("{}: {e}", path.display())))
}

fn write_entry(path: &Path, entry: &RegistryEntry) -> Result<(), RegistryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let json = serde_json::to_vec_pretty(entry)
        .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    tmp.write_all(&json).map_err(|e| io_error(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

fn remove_entry(path: &Path) -> Result<bool, RegistryError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error(path, e)),
    }
}

#[async_trait]
impl TaskRegistry for FileRegistry {
    async fn load(&self) -> Result<Option<RegistryEntry>, RegistryError> {
        self.blocking(read_entry).await
    }

    async fn save(&self, entry: &RegistryEntry) -> Result<(), RegistryError> {
        let owned = entry.clone();
        self.blocking(move |path| write_entry(path, &owned)).await?;
        debug!(path = %self.path.display(), task = %entry.task_handle, "Registry written");
        Ok(())
    }

    async fn clear(&self) -> Result<bool, RegistryError> {
        self.blocking(remove_entry).await
    }
}
