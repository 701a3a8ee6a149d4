//! Pull engine: source API → resource cache + content store.
//!
//! Pulling is re-runnable: snapshots are write-once unless forced,
//! attachments are skipped when the cached bytes still match their
//! recorded hash, and thumbnails are normalized to JPEG exactly once.
//! A failure while downloading one resource never aborts the rest of
//! the batch.

use tracing::{debug, error, info, warn};

use crate::domain::{Attachment, Video};
use crate::error::{MigrateError, Result};
use crate::media;
use crate::platform::Source;
use crate::store::{ContentStore, ResourceCache};

pub struct PullEngine<'a, S: Source> {
    source: &'a S,
    cache: &'a ResourceCache,
    attachments: &'a ContentStore,
    thumbnails: &'a ContentStore,
}

/// What one pull invocation did.
#[derive(Debug, Default, PartialEq)]
pub struct PullReport {
    pub videos: usize,
    pub profiles: usize,
    pub attachments_downloaded: usize,
    pub thumbnails_stored: usize,
    pub failures: usize,
}

impl<'a, S: Source> PullEngine<'a, S> {
    pub fn new(
        source: &'a S,
        cache: &'a ResourceCache,
        attachments: &'a ContentStore,
        thumbnails: &'a ContentStore,
    ) -> Self {
        Self {
            source,
            cache,
            attachments,
            thumbnails,
        }
    }

    /// Fetch every record from the source and fill the local stores.
    pub async fn pull(&self, force: bool) -> Result<PullReport> {
        let mut report = PullReport::default();

        let published = self.source.published_videos().await?;
        let pending = self.source.pending_videos().await?;
        info!(
            "Pulled {} published and {} pending video records",
            published.len(),
            pending.len()
        );

        let videos = published
            .into_iter()
            .map(|v| (v, false))
            .chain(pending.into_iter().map(|v| (v, true)));

        for (mut video, quarantined) in videos {
            video.quarantined = quarantined;
            match self.pull_video(&video, force, &mut report).await {
                Ok(()) => report.videos += 1,
                Err(e) => {
                    // Isolated to this resource; the batch continues.
                    error!("Failed to pull video {}: {}", video.describe(), e);
                    report.failures += 1;
                }
            }
        }

        for profile in self.source.profiles().await? {
            self.cache.persist(&profile, force).await?;
            report.profiles += 1;
        }

        info!(
            "Pull done: {} videos, {} profiles, {} attachments downloaded, {} failures",
            report.videos, report.profiles, report.attachments_downloaded, report.failures
        );
        Ok(report)
    }

    async fn pull_video(&self, video: &Video, force: bool, report: &mut PullReport) -> Result<()> {
        self.cache.persist(video, force).await?;

        if self.pull_attachment(&video.attachment, force).await? {
            report.attachments_downloaded += 1;
        }
        if self.pull_thumbnail(video, force).await? {
            report.thumbnails_stored += 1;
        }
        Ok(())
    }

    /// Download the attachment unless the cached copy still matches its
    /// recorded content hash. Returns whether a download happened.
    async fn pull_attachment(&self, attachment: &Attachment, force: bool) -> Result<bool> {
        // Attachments are keyed by their own hash.
        let key = &attachment.content_hash;

        if !force && self.attachments.has(key) {
            match self.attachments.check(key, key).await {
                Ok(()) => {
                    debug!("Attachment {} already cached", key);
                    return Ok(false);
                }
                Err(e @ MigrateError::Integrity { .. }) => {
                    warn!("{e}; treating cached copy as stale");
                }
                Err(e) => return Err(e),
            }
        }

        info!("Downloading {}", attachment.source_location);
        let mut staged = self.attachments.begin(key).await?;
        let bytes = self
            .source
            .download(&attachment.source_location, &mut staged)
            .await?;
        staged.commit().await?;
        debug!("Stored {} ({} bytes)", key, bytes);

        if let Err(e) = self.attachments.check(key, key).await {
            // The source may re-compress on the fly; keep the bytes and
            // let the operator decide.
            warn!("Downloaded attachment differs from its record: {e}");
        }
        Ok(true)
    }

    /// Fetch and JPEG-normalize the thumbnail, keyed by video id.
    /// A missing remote thumbnail is expected and leaves the video
    /// cached without one. Returns whether a thumbnail was stored.
    async fn pull_thumbnail(&self, video: &Video, force: bool) -> Result<bool> {
        let Some(location) = video.thumbnail.as_deref() else {
            return Ok(false);
        };

        let key = video.thumbnail_filename();
        if !force && self.thumbnails.has(&key) {
            return Ok(false);
        }

        let raw = if media::is_data_uri(location) {
            media::decode_data_uri(location)?
        } else {
            match self.source.fetch(location).await {
                Ok(bytes) => bytes,
                Err(e) if e.is_not_found() => {
                    info!("No thumbnail for video {}", video.describe());
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        };

        let jpeg = media::normalize_to_jpeg(&raw)?;
        self.thumbnails.put(&key, &jpeg).await?;
        Ok(true)
    }
}
