//! Artifact storage collaborator.
//!
//! Persists uploaded transcripts and hands back the locator recorded on the
//! work item at completion. The filesystem implementation derives the output
//! path from the item's `cache_locator`: the configured directory template
//! may reference `{source_dir}` (the directory holding the cached audio),
//! and the transcript is stored next to the audio file name with a `.vtt`
//! suffix.

use crate::error::{Error, Result};
use crate::model::WorkItem;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Durably persist `data` for `item`, returning the result locator.
    /// Must not be called with an empty `cache_locator`; implementations
    /// reject that with `ArtifactPersist` before writing anything.
    async fn persist(&self, item: &WorkItem, data: &[u8]) -> Result<String>;
}

/// Filesystem-backed artifact store.
pub struct FsArtifactStore {
    dir_template: String,
}

impl FsArtifactStore {
    /// `dir_template` is the target directory; `{source_dir}` expands to the
    /// directory portion of the item's `cache_locator`.
    pub fn new(dir_template: impl Into<String>) -> Self {
        Self {
            dir_template: dir_template.into(),
        }
    }

    fn target_path(&self, item: &WorkItem) -> Result<String> {
        if item.cache_locator.is_empty() {
            return Err(Error::ArtifactPersist(format!(
                "work item {} has no cache locator",
                item.id
            )));
        }

        let (source_dir, file_name) = match item.cache_locator.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", item.cache_locator.as_str()),
        };
        let dir = self.dir_template.replace("{source_dir}", source_dir);
        Ok(format!("{dir}/{file_name}.vtt"))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(&self, item: &WorkItem, data: &[u8]) -> Result<String> {
        let path = self.target_path(item)?;

        if let Some(parent) = std::path::Path::new(&path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::ArtifactPersist(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| Error::ArtifactPersist(format!("write {path}: {e}")))?;

        info!(id = %item.id, path, "artifact persisted");
        Ok(path)
    }
}

/// In-memory artifact store for tests.
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn fetch(&self, locator: &str) -> Option<Vec<u8>> {
        self.artifacts.lock().await.get(locator).cloned()
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn persist(&self, item: &WorkItem, data: &[u8]) -> Result<String> {
        if item.cache_locator.is_empty() {
            return Err(Error::ArtifactPersist(format!(
                "work item {} has no cache locator",
                item.id
            )));
        }
        let locator = format!("mem://{}.vtt", item.id);
        self.artifacts
            .lock()
            .await
            .insert(locator.clone(), data.to_vec());
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewWorkItem;

    fn item_with_cache(cache: &str) -> WorkItem {
        NewWorkItem::new("Some Podcast", "de")
            .source_locator("https://example.net/ep1.mp3")
            .cache_locator(cache)
            .build()
    }

    #[test]
    fn expands_source_dir_template() {
        let store = FsArtifactStore::new("{source_dir}/vtt");
        let item = item_with_cache("/cache/podcasts/de/1700000000_ep1.mp3");
        assert_eq!(
            store.target_path(&item).unwrap(),
            "/cache/podcasts/de/vtt/1700000000_ep1.mp3.vtt"
        );
    }

    #[test]
    fn fixed_directory_without_template() {
        let store = FsArtifactStore::new("/var/transcripts");
        let item = item_with_cache("/cache/de/ep2.mp3");
        assert_eq!(
            store.target_path(&item).unwrap(),
            "/var/transcripts/ep2.mp3.vtt"
        );
    }

    #[test]
    fn empty_cache_locator_is_rejected() {
        let store = FsArtifactStore::new("/var/transcripts");
        let item = item_with_cache("");
        assert!(matches!(
            store.target_path(&item),
            Err(Error::ArtifactPersist(_))
        ));
    }
}
