//! Cross-system identity mapping.
//!
//! A durable key-value table in a single JSON file: source resource id →
//! identifier assigned by the destination. Partitioned by destination
//! endpoint URL so the same store file can serve a staging and a
//! production destination without cross-pollution.
//!
//! Every `set` rewrites the file atomically before the next resource is
//! processed; a crash mid-run loses at most the in-flight resource.
//! Entries are never deleted by the engine; manual truncation is the
//! only way to force a re-push.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{MigrateError, Result};

pub struct MappingStore {
    path: PathBuf,
    endpoint: String,
    data: HashMap<String, HashMap<String, String>>,
}

impl MappingStore {
    /// Load the store file (or start empty) scoped to one destination
    /// endpoint.
    pub async fn open(path: impl Into<PathBuf>, endpoint: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let endpoint = endpoint.into();

        let data = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            endpoint,
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn partition(&self) -> Option<&HashMap<String, String>> {
        self.data.get(&self.endpoint)
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.partition()
            .map(|p| p.contains_key(source_id))
            .unwrap_or(false)
    }

    pub fn get(&self, source_id: &str) -> Result<&str> {
        self.partition()
            .and_then(|p| p.get(source_id))
            .map(String::as_str)
            .ok_or_else(|| MigrateError::NotFound(format!("mapping for {source_id}")))
    }

    /// Record a confirmed destination id. Persists before returning.
    pub async fn set(&mut self, source_id: &str, destination_id: &str) -> Result<()> {
        self.data
            .entry(self.endpoint.clone())
            .or_default()
            .insert(source_id.to_string(), destination_id.to_string());
        self.write().await
    }

    /// Number of entries in this endpoint's partition.
    pub fn len(&self) -> usize {
        self.partition().map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.data)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut temp.as_file(), json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}
