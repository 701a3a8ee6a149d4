//! Error kinds for the migration engine.
//!
//! The push/pull loops branch on these kinds: `NotFound` is expected for
//! mapping misses and absent thumbnails, `Conflict` is a success-skip,
//! `Validation` halts the batch unless `--skip-errors` is set, and
//! `Integrity` triggers a re-download and never reaches the caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// Transient network failure. No in-process retry; a re-run retries.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote side has no such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The destination already holds an equivalent resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The destination rejected the payload.
    #[error("validation rejected for {resource}: {detail}")]
    Validation { resource: String, detail: String },

    /// A cached file's bytes no longer match the recorded content hash.
    #[error("content hash mismatch for {key}: expected {expected}, got {actual}")]
    Integrity {
        key: String,
        expected: String,
        actual: String,
    },

    /// Any other non-success response from a platform API.
    #[error("unexpected response {status} from {url}: {body}")]
    Api {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed {what}: {detail}")]
    Malformed { what: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl MigrateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MigrateError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, MigrateError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(MigrateError::NotFound("video abc".into()).is_not_found());
        assert!(MigrateError::Conflict("account bob".into()).is_conflict());
        assert!(!MigrateError::Conflict("account bob".into()).is_not_found());
    }

    #[test]
    fn test_display_carries_context() {
        let err = MigrateError::Validation {
            resource: "video 42 (Lundi matin)".into(),
            detail: "description too short".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("video 42"));
        assert!(msg.contains("description too short"));
    }
}
