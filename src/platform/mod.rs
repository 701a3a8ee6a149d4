//! Platform interfaces for the source and destination systems.
//!
//! The engines only see these traits; the HTTP clients implement them.
//! Tests substitute in-memory fakes, which is what keeps the pull/push
//! policy testable without a network.

pub mod dest;
pub mod source;

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Profile, UploadMetadata, Video};
use crate::error::{MigrateError, Result};
use crate::store::StagedWrite;

pub use dest::DestinationClient;
pub use source::SourceClient;

/// A short-lived bearer capability for one acting user.
///
/// Uploads happen on behalf of the resolved owner, so tokens are resolved
/// per action and passed explicitly; there is no ambient session.
#[derive(Debug, Clone)]
pub struct AccessToken {
    username: String,
    secret: String,
}

impl AccessToken {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn bearer(&self) -> &str {
        &self.secret
    }
}

/// A cached thumbnail attached to an upload, already JPEG-normalized.
#[derive(Debug, Clone)]
pub struct ThumbnailUpload {
    pub path: PathBuf,
    pub filename: String,
}

/// Everything the destination needs for one video upload.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub metadata: UploadMetadata,
    pub video_path: PathBuf,
    pub video_filename: String,
    pub video_mime: String,
    pub thumbnail: Option<ThumbnailUpload>,
}

/// Read side: the origin records service.
#[async_trait]
pub trait Source: Send + Sync {
    /// Records of the published-videos collection.
    async fn published_videos(&self) -> Result<Vec<Video>>;

    /// Records of the pending/unmoderated collection.
    async fn pending_videos(&self) -> Result<Vec<Video>>;

    /// Validated account profiles, with the account email injected.
    async fn profiles(&self) -> Result<Vec<Profile>>;

    /// Fetch a small resource (a thumbnail) fully into memory.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Stream a large resource into a staged content-store write.
    /// Returns the byte count. The caller commits.
    async fn download(&self, url: &str, dest: &mut StagedWrite) -> Result<u64>;
}

/// Write side: the target video-hosting service.
#[async_trait]
pub trait Destination: Send + Sync {
    /// OAuth2 resource-owner-password login for one acting user.
    async fn login(&self, username: &str) -> Result<AccessToken>;

    async fn account_exists(&self, username: &str) -> Result<bool>;

    /// Create a destination account (administrator context).
    async fn create_account(&self, admin: &AccessToken, email: &str, username: &str)
        -> Result<()>;

    /// Set display name and bio, authenticated as the account itself.
    async fn update_account_details(
        &self,
        token: &AccessToken,
        display_name: &str,
        bio: &str,
    ) -> Result<()>;

    /// The acting user's default upload channel.
    async fn default_channel(&self, token: &AccessToken) -> Result<u64>;

    async fn video_exists(&self, id: &Uuid) -> Result<bool>;

    /// Multipart upload; returns the destination-assigned id.
    async fn upload_video(&self, token: &AccessToken, upload: &VideoUpload) -> Result<Uuid>;

    /// Lift the default moderation hold from a newly uploaded video
    /// (administrator context).
    async fn clear_moderation_hold(&self, admin: &AccessToken, id: &Uuid) -> Result<()>;
}

/// Map a non-success HTTP response onto an engine error kind.
pub(crate) async fn response_error(resp: reqwest::Response, resource: &str) -> MigrateError {
    let status = resp.status().as_u16();
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    let mut detail: String = body.chars().take(300).collect();
    if detail.is_empty() {
        detail = format!("status {status}");
    }

    match status {
        404 => MigrateError::NotFound(resource.to_string()),
        409 => MigrateError::Conflict(resource.to_string()),
        400 | 422 => MigrateError::Validation {
            resource: resource.to_string(),
            detail,
        },
        _ => MigrateError::Api {
            url,
            status,
            body: detail,
        },
    }
}
