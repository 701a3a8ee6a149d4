//! Per-resource JSON snapshots.
//!
//! One document per resource, named `<id>.json` under a fixed
//! subdirectory per kind. `persist` without `force` never overwrites:
//! the first successful pull is authoritative until an operator forces a
//! refresh, which is what makes re-running the pull engine safe.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::warn;

use crate::domain::{Profile, Video};
use crate::error::Result;

/// A resource kind the cache knows how to file.
pub trait CacheRecord: Serialize + DeserializeOwned {
    /// Subdirectory name under the cache root.
    const KIND: &'static str;

    /// Source-assigned identifier, used as the document name.
    fn cache_id(&self) -> &str;
}

impl CacheRecord for Video {
    const KIND: &'static str = "videos";

    fn cache_id(&self) -> &str {
        &self.id
    }
}

impl CacheRecord for Profile {
    const KIND: &'static str = "profiles";

    fn cache_id(&self) -> &str {
        &self.id
    }
}

pub struct ResourceCache {
    root: PathBuf,
}

impl ResourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir<R: CacheRecord>(&self) -> PathBuf {
        self.root.join(R::KIND)
    }

    pub fn document_path<R: CacheRecord>(&self, id: &str) -> PathBuf {
        self.kind_dir::<R>().join(format!("{id}.json"))
    }

    /// Write the snapshot if missing or `force`. Returns whether it wrote.
    pub async fn persist<R: CacheRecord>(&self, resource: &R, force: bool) -> Result<bool> {
        let dir = self.kind_dir::<R>();
        fs::create_dir_all(&dir).await?;

        let path = self.document_path::<R>(resource.cache_id());
        if path.exists() && !force {
            return Ok(false);
        }

        let json = serde_json::to_string_pretty(resource)?;
        let temp = tempfile::NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut temp.as_file(), json.as_bytes())?;
        temp.persist(&path).map_err(|e| e.error)?;

        Ok(true)
    }

    pub async fn load<R: CacheRecord>(&self, id: &str) -> Result<Option<R>> {
        let path = self.document_path::<R>(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Every persisted document of a kind, ordered by document name so
    /// runs are reproducible.
    ///
    /// Documents that fail to parse are skipped with a warning; one
    /// corrupt snapshot must not block the batch.
    pub async fn all<R: CacheRecord>(&self) -> Result<Vec<R>> {
        let dir = self.kind_dir::<R>();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut resources = Vec::new();
        for path in paths {
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str(&content) {
                Ok(resource) => resources.push(resource),
                Err(e) => warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }

        Ok(resources)
    }

    pub async fn count<R: CacheRecord>(&self) -> Result<usize> {
        Ok(self.all::<R>().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(id: &str, email: &str) -> Profile {
        Profile {
            id: id.to_string(),
            email: email.to_string(),
            display_name: "Test".to_string(),
            bio: String::new(),
            last_modified: None,
        }
    }

    #[tokio::test]
    async fn test_persist_is_write_once() {
        let temp = TempDir::new().unwrap();
        let cache = ResourceCache::new(temp.path());

        let first = profile("p1", "first@example.org");
        assert!(cache.persist(&first, false).await.unwrap());

        let second = profile("p1", "second@example.org");
        assert!(!cache.persist(&second, false).await.unwrap());

        let loaded: Profile = cache.load("p1").await.unwrap().unwrap();
        assert_eq!(loaded.email, "first@example.org");
    }

    #[tokio::test]
    async fn test_force_overwrites() {
        let temp = TempDir::new().unwrap();
        let cache = ResourceCache::new(temp.path());

        cache
            .persist(&profile("p1", "first@example.org"), false)
            .await
            .unwrap();
        assert!(cache
            .persist(&profile("p1", "second@example.org"), true)
            .await
            .unwrap());

        let loaded: Profile = cache.load("p1").await.unwrap().unwrap();
        assert_eq!(loaded.email, "second@example.org");
    }

    #[tokio::test]
    async fn test_all_enumerates_every_document() {
        let temp = TempDir::new().unwrap();
        let cache = ResourceCache::new(temp.path());

        for i in 0..3 {
            cache
                .persist(&profile(&format!("p{i}"), "a@b.c"), false)
                .await
                .unwrap();
        }

        let all: Vec<Profile> = cache.all().await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_all_skips_corrupt_documents() {
        let temp = TempDir::new().unwrap();
        let cache = ResourceCache::new(temp.path());

        cache.persist(&profile("p1", "a@b.c"), false).await.unwrap();
        std::fs::write(temp.path().join("profiles").join("bad.json"), b"{oops").unwrap();

        let all: Vec<Profile> = cache.all().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_kinds_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let cache = ResourceCache::new(temp.path());

        cache.persist(&profile("x", "a@b.c"), false).await.unwrap();
        let videos: Vec<Video> = cache.all().await.unwrap();
        assert!(videos.is_empty());
    }
}
