use async_trait::async_trait;
use log::error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;
use crate::model::OfflineAction;

/// Durable, ordered backing list of queued actions.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<OfflineAction>>;

    async fn save(&self, actions: &[OfflineAction]) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Stores the queue as one JSON array. Saves go through a temp file and a
/// rename so a crash never leaves a half-written queue.
#[derive(Debug, Clone)]
pub struct JsonFileQueueStore {
    path: PathBuf,
}

impl JsonFileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    /// Where an unreadable queue file is moved before the queue starts over.
    pub fn quarantine_path(&self) -> PathBuf {
        self.sibling_path(".corrupt")
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
    async fn load(&self) -> Result<Vec<OfflineAction>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&raw) {
            Ok(actions) => Ok(actions),
            Err(e) => {
                let quarantine = self.quarantine_path();
                // Only start over once the unreadable bytes are out of the way.
                tokio::fs::rename(&self.path, &quarantine).await?;
                error!(
                    "[OfflineQueue] Unreadable queue file {} moved to {}: {}",
                    self.path.display(),
                    quarantine.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, actions: &[OfflineAction]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, serde_json::to_vec(actions)?).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    actions: Mutex<Vec<OfflineAction>>,
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<OfflineAction>> {
        Ok(self
            .actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn save(&self, actions: &[OfflineAction]) -> Result<()> {
        *self.actions.lock().unwrap_or_else(|e| e.into_inner()) = actions.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }
}
