//! Content-addressed binary store.
//!
//! Attachments are keyed by their content hash (two videos sharing
//! identical bytes share storage); thumbnails are keyed per video id
//! because they are mutable per video. Every write lands on its final
//! path atomically via rename, so the existence check and the write
//! target are the same path: either the whole file exists or it doesn't.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{MigrateError, Result};

pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final on-disk path for a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    /// Store a complete byte buffer under a key.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).await?;
        let target = self.path(key);

        let temp = tempfile::NamedTempFile::new_in(&self.root)?;
        std::io::Write::write_all(&mut temp.as_file(), bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| e.error)?;

        Ok(target)
    }

    /// Open a staged write for a streamed download. Nothing is visible
    /// under the key until `commit`; an abandoned stage is cleaned up on
    /// drop.
    pub async fn begin(&self, key: &str) -> Result<StagedWrite> {
        fs::create_dir_all(&self.root).await?;
        let staging = self.root.join(format!(".{key}.part"));
        let file = File::create(&staging).await?;
        Ok(StagedWrite {
            staging,
            target: self.path(key),
            file: Some(file),
        })
    }

    /// Check the cached file's SHA-256 against an expected hex digest.
    /// `NotFound` when the key is absent, `Integrity` on a mismatch.
    pub async fn check(&self, key: &str, expected_hex: &str) -> Result<()> {
        let path = self.path(key);
        if !path.exists() {
            return Err(MigrateError::NotFound(format!("cached content {key}")));
        }

        let mut file = File::open(&path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let actual = hex::encode(hasher.finalize());
        if actual.eq_ignore_ascii_case(expected_hex) {
            Ok(())
        } else {
            Err(MigrateError::Integrity {
                key: key.to_string(),
                expected: expected_hex.to_lowercase(),
                actual,
            })
        }
    }

    /// `check`, flattened to a bool: matches, or is absent/stale.
    pub async fn verify(&self, key: &str, expected_hex: &str) -> Result<bool> {
        match self.check(key, expected_hex).await {
            Ok(()) => Ok(true),
            Err(MigrateError::NotFound(_)) | Err(MigrateError::Integrity { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// An in-flight write that becomes visible only on `commit`.
pub struct StagedWrite {
    staging: PathBuf,
    target: PathBuf,
    file: Option<File>,
}

impl StagedWrite {
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self.file.as_mut().expect("staged write already committed");
        file.write_all(bytes).await?;
        Ok(())
    }

    /// Flush, fsync, and rename onto the final path.
    pub async fn commit(mut self) -> Result<PathBuf> {
        let mut file = self.file.take().expect("staged write already committed");
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.staging, &self.target).await?;
        Ok(self.target.clone())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if self.file.is_some() {
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}
