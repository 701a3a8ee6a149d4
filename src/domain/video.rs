//! Video and attachment entities.
//!
//! A `Video` is deserialized straight from a source collection record and
//! persisted as-is in the resource cache. The wire names differ from ours
//! (`duration`, `mimetype`, ...) so every renamed field carries a serde
//! attribute; unknown wire fields are ignored.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of tags the destination accepts per video.
pub const MAX_TAGS: usize = 5;

/// Maximum length (in characters) of a single tag on the destination.
pub const MAX_TAG_LEN: usize = 30;

/// A binary asset owned by exactly one video.
///
/// Immutable once downloaded; identified on disk by its content hash so
/// repeated pulls of unchanged content are no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,

    /// SHA-256 of the file bytes, as recorded by the source platform.
    #[serde(rename = "hash")]
    pub content_hash: String,

    /// Download URL on the source platform.
    #[serde(rename = "location")]
    pub source_location: String,

    #[serde(rename = "mimetype")]
    pub mime_type: String,

    #[serde(rename = "size")]
    pub size_bytes: u64,
}

impl Attachment {
    /// File name to present to the destination (last URL segment).
    pub fn upload_filename(&self) -> &str {
        self.source_location
            .rsplit('/')
            .next()
            .unwrap_or(&self.filename)
    }
}

/// A source video record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Source-assigned identifier, stable, used as the cache key.
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "duration", default)]
    pub duration_seconds: u64,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Thumbnail location: an HTTP URL or an inline `data:` URI.
    #[serde(default)]
    pub thumbnail: Option<String>,

    /// Epoch milliseconds; absent on the oldest records.
    #[serde(rename = "creation_date", default)]
    pub creation_timestamp: Option<i64>,

    /// Epoch milliseconds; absent until the record was first published.
    #[serde(rename = "publish_date", default)]
    pub publish_timestamp: Option<i64>,

    #[serde(default)]
    pub grade: Option<String>,

    #[serde(rename = "profile", default)]
    pub profile_id: Option<String>,

    pub attachment: Attachment,

    /// True when the record came from the pending/unmoderated pool.
    /// Not on the wire; set by the pull engine.
    #[serde(default)]
    pub quarantined: bool,

    /// Cached copy of the destination-assigned id. The identity mapping
    /// store stays authoritative; this field is informational.
    #[serde(default)]
    pub destination_id: Option<Uuid>,

    #[serde(default)]
    pub last_modified: Option<i64>,
}

impl Video {
    /// Destination-shaped metadata for the upload call.
    pub fn upload_metadata(&self, channel_id: u64) -> UploadMetadata {
        UploadMetadata {
            name: self.title.clone(),
            channel_id,
            description: self.upload_description().to_string(),
            tags: self.upload_tags(),
            originally_published_at: self.published_at(),
        }
    }

    /// The destination rejects empty descriptions; fall back to the title.
    pub fn upload_description(&self) -> &str {
        if self.description.is_empty() {
            &self.title
        } else {
            &self.description
        }
    }

    /// At most `MAX_TAGS` tags of at most `MAX_TAG_LEN` characters.
    pub fn upload_tags(&self) -> Vec<String> {
        self.keywords
            .iter()
            .take(MAX_TAGS)
            .map(|k| k.chars().take(MAX_TAG_LEN).collect())
            .collect()
    }

    /// Original publish time, when the record carries one.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.publish_timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// File name under which the normalized thumbnail is cached and uploaded.
    pub fn thumbnail_filename(&self) -> String {
        format!("{}.jpg", self.id)
    }

    /// Short human-readable handle for log lines.
    pub fn describe(&self) -> String {
        format!("{} ({})", self.id, self.title)
    }
}

/// The metadata fields of a destination upload, already mapped and capped.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMetadata {
    pub name: String,
    pub channel_id: u64,
    pub description: String,
    pub tags: Vec<String>,
    pub originally_published_at: Option<DateTime<Utc>>,
}
