//! Push engine: local cache → destination upload API.
//!
//! Profiles go first (videos are uploaded on behalf of their owners),
//! then videos. Idempotency rests on the identity mapping store: a video
//! whose mapped destination id still resolves is skipped, and the
//! mapping is written, durably, immediately after each confirmed upload.
//! An interrupted or halted run can therefore always be re-invoked.

use std::collections::HashMap;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Profile, Video};
use crate::engine::ownership::{resolve_owner, OwnershipTable};
use crate::error::{MigrateError, Result};
use crate::platform::{AccessToken, Destination, ThumbnailUpload, VideoUpload};
use crate::store::{ContentStore, MappingStore, ResourceCache};

#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Cap on *newly pushed* resources per loop; `None` pushes everything.
    pub limit: Option<usize>,

    /// Log per-resource failures and keep going instead of halting.
    pub skip_errors: bool,

    /// System account: administrative actions and the upload fallback.
    pub admin_user: String,
}

/// What one push invocation did.
#[derive(Debug, Default, PartialEq)]
pub struct PushReport {
    pub profiles_pushed: usize,
    pub videos_pushed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct PushEngine<'a, D: Destination> {
    dest: &'a D,
    cache: &'a ResourceCache,
    attachments: &'a ContentStore,
    thumbnails: &'a ContentStore,
    mapping: &'a mut MappingStore,
    ownership: &'a OwnershipTable,
    options: PushOptions,
}

impl<'a, D: Destination> PushEngine<'a, D> {
    pub fn new(
        dest: &'a D,
        cache: &'a ResourceCache,
        attachments: &'a ContentStore,
        thumbnails: &'a ContentStore,
        mapping: &'a mut MappingStore,
        ownership: &'a OwnershipTable,
        options: PushOptions,
    ) -> Self {
        Self {
            dest,
            cache,
            attachments,
            thumbnails,
            mapping,
            ownership,
            options,
        }
    }

    /// Profiles first, then videos.
    pub async fn push(&mut self) -> Result<PushReport> {
        let mut report = PushReport::default();
        self.push_profiles(&mut report).await?;
        self.push_videos(&mut report).await?;
        Ok(report)
    }

    pub async fn push_profiles(&mut self, report: &mut PushReport) -> Result<()> {
        let admin = self.dest.login(&self.options.admin_user).await?;
        let profiles: Vec<Profile> = self.cache.all().await?;
        let mut pushed = 0usize;

        for profile in &profiles {
            if self.at_limit(pushed) {
                info!("Profile limit ({}) reached", pushed);
                break;
            }

            match self.push_profile(&admin, profile).await {
                Ok(true) => {
                    pushed += 1;
                    report.profiles_pushed += 1;
                }
                Ok(false) => report.skipped += 1,
                Err(e) if e.is_conflict() => {
                    info!("Account {} already taken on the destination", profile.username());
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Failed to push profile {}: {}", profile.email, e);
                    if self.options.skip_errors {
                        report.failed += 1;
                    } else {
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns whether the account was newly created.
    async fn push_profile(&self, admin: &AccessToken, profile: &Profile) -> Result<bool> {
        let username = profile.username();

        if self.dest.account_exists(&username).await? {
            info!("Account {} already on the destination", username);
            return Ok(false);
        }

        info!("Creating account {}", username);
        self.dest
            .create_account(admin, &profile.email, &username)
            .await?;

        // Account creation and detail update are separate authorization
        // contexts: the details call must come from the account itself.
        let token = self.dest.login(&username).await?;
        self.dest
            .update_account_details(&token, &profile.upload_display_name(), &profile.bio)
            .await?;
        Ok(true)
    }

    pub async fn push_videos(&mut self, report: &mut PushReport) -> Result<()> {
        let admin = self.dest.login(&self.options.admin_user).await?;
        let profiles_by_email: HashMap<String, Profile> = self
            .cache
            .all::<Profile>()
            .await?
            .into_iter()
            .map(|p| (p.email.clone(), p))
            .collect();

        let videos: Vec<Video> = self.cache.all().await?;
        let mut pushed = 0usize;

        for video in &videos {
            if self.at_limit(pushed) {
                info!("Video limit ({}) reached", pushed);
                break;
            }

            if self.already_pushed(video).await? {
                report.skipped += 1;
                continue;
            }

            match self.push_video(video, &profiles_by_email).await {
                Ok(destination_id) => {
                    // Commit the mapping before anything else: from here
                    // on, a re-run will skip this video.
                    self.mapping
                        .set(&video.id, &destination_id.to_string())
                        .await?;
                    self.record_destination_id(video, destination_id).await;

                    if !video.quarantined {
                        self.lift_hold(&admin, video, &destination_id).await;
                    }

                    pushed += 1;
                    report.videos_pushed += 1;
                }
                Err(e) if e.is_conflict() => {
                    info!("Destination already holds {}", video.describe());
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Failed to push video {}: {}", video.describe(), e);
                    if self.options.skip_errors {
                        report.failed += 1;
                    } else {
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Idempotency short-circuit: a mapped id that still resolves on the
    /// destination means this video is done. A mapped id that 404s is
    /// treated as never pushed.
    async fn already_pushed(&self, video: &Video) -> Result<bool> {
        if !self.mapping.contains(&video.id) {
            return Ok(false);
        }

        let mapped = self.mapping.get(&video.id)?;
        let Ok(destination_id) = Uuid::parse_str(mapped) else {
            // Only a hand-edited store can produce this; skipping is the
            // choice that cannot duplicate an upload.
            warn!(
                "Unparseable mapping entry '{}' for video {}; skipping",
                mapped,
                video.describe()
            );
            return Ok(true);
        };

        if self.dest.video_exists(&destination_id).await? {
            info!(
                "Video {} already on the destination as {}",
                video.describe(),
                destination_id
            );
            Ok(true)
        } else {
            info!(
                "Mapped id {} gone from the destination; re-pushing {}",
                destination_id,
                video.describe()
            );
            Ok(false)
        }
    }

    async fn push_video(
        &self,
        video: &Video,
        profiles_by_email: &HashMap<String, Profile>,
    ) -> Result<Uuid> {
        let username = resolve_owner(
            video,
            self.ownership,
            profiles_by_email,
            &self.options.admin_user,
        );

        let token = self.dest.login(&username).await?;
        let channel_id = self.dest.default_channel(&token).await?;
        let upload = self.build_upload(video, channel_id)?;

        info!("Uploading {} as {}", video.describe(), username);
        self.dest.upload_video(&token, &upload).await
    }

    fn build_upload(&self, video: &Video, channel_id: u64) -> Result<VideoUpload> {
        let video_path = self.attachments.path(&video.attachment.content_hash);
        if !video_path.exists() {
            return Err(MigrateError::NotFound(format!(
                "cached attachment for video {}",
                video.describe()
            )));
        }

        let thumbnail_key = video.thumbnail_filename();
        let thumbnail = self.thumbnails.has(&thumbnail_key).then(|| ThumbnailUpload {
            path: self.thumbnails.path(&thumbnail_key),
            filename: thumbnail_key.clone(),
        });

        Ok(VideoUpload {
            metadata: video.upload_metadata(channel_id),
            video_path,
            video_filename: video.attachment.upload_filename().to_string(),
            video_mime: video.attachment.mime_type.clone(),
            thumbnail,
        })
    }

    /// Write the assigned id back into the cached snapshot. Informational
    /// only: the mapping store stays authoritative, so a failure here is
    /// logged and swallowed.
    async fn record_destination_id(&self, video: &Video, destination_id: Uuid) {
        let mut updated = video.clone();
        updated.destination_id = Some(destination_id);
        if let Err(e) = self.cache.persist(&updated, true).await {
            warn!(
                "Could not record destination id on snapshot {}: {}",
                video.id, e
            );
        }
    }

    /// The destination blacklists fresh uploads by default; published
    /// videos must come out of that hold to be visible. The mapping is
    /// already recorded, so a failure is logged for manual follow-up
    /// rather than halting the run.
    async fn lift_hold(&self, admin: &AccessToken, video: &Video, destination_id: &Uuid) {
        info!("Lifting moderation hold on {}", destination_id);
        match self.dest.clear_moderation_hold(admin, destination_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(
                "Could not lift moderation hold on {} ({}): {}",
                destination_id,
                video.describe(),
                e
            ),
        }
    }

    fn at_limit(&self, pushed: usize) -> bool {
        self.options.limit.map(|l| pushed >= l).unwrap_or(false)
    }
}
