//! Pull Engine Integration Tests
//!
//! Exercises the pull loop against an in-memory source: idempotency,
//! content-hash staleness, thumbnail normalization, and per-resource
//! failure isolation.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use vidport::domain::{Attachment, Profile, Video};
use vidport::error::{MigrateError, Result};
use vidport::platform::Source;
use vidport::store::{ContentStore, ResourceCache, StagedWrite};
use vidport::PullEngine;

/// In-memory source platform that counts its network calls.
#[derive(Default)]
struct FakeSource {
    published: Vec<Video>,
    pending: Vec<Video>,
    profiles: Vec<Profile>,
    /// URL → bytes, for attachments and thumbnails alike.
    resources: HashMap<String, Vec<u8>>,
    fetches: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeSource {
    fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Source for FakeSource {
    async fn published_videos(&self) -> Result<Vec<Video>> {
        Ok(self.published.clone())
    }

    async fn pending_videos(&self) -> Result<Vec<Video>> {
        Ok(self.pending.clone())
    }

    async fn profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.clone())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.lock().unwrap().push(url.to_string());
        self.resources
            .get(url)
            .cloned()
            .ok_or_else(|| MigrateError::NotFound(url.to_string()))
    }

    async fn download(&self, url: &str, dest: &mut StagedWrite) -> Result<u64> {
        self.downloads.lock().unwrap().push(url.to_string());
        let bytes = self.resources.get(url).ok_or_else(|| MigrateError::Api {
            url: url.to_string(),
            status: 500,
            body: "gone".to_string(),
        })?;
        dest.write_all(bytes).await?;
        Ok(bytes.len() as u64)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 128, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn video(id: &str, attachment_bytes: &[u8], thumbnail: Option<&str>) -> Video {
    Video {
        id: id.to_string(),
        title: format!("Video {id}"),
        description: String::new(),
        duration_seconds: 60,
        keywords: vec!["maths".to_string()],
        thumbnail: thumbnail.map(String::from),
        creation_timestamp: Some(1_546_300_800_000),
        publish_timestamp: Some(1_546_387_200_000),
        grade: None,
        profile_id: None,
        attachment: Attachment {
            filename: format!("{id}.mp4"),
            content_hash: sha256_hex(attachment_bytes),
            source_location: format!("https://records.example/files/{id}.mp4"),
            mime_type: "video/mp4".to_string(),
            size_bytes: attachment_bytes.len() as u64,
        },
        quarantined: false,
        destination_id: None,
        last_modified: None,
    }
}

struct Fixture {
    _temp: TempDir,
    cache: ResourceCache,
    attachments: ContentStore,
    thumbnails: ContentStore,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let cache = ResourceCache::new(temp.path());
        let attachments = ContentStore::new(temp.path().join("attachments"));
        let thumbnails = ContentStore::new(temp.path().join("thumbnails"));
        Self {
            _temp: temp,
            cache,
            attachments,
            thumbnails,
        }
    }
}

#[tokio::test]
async fn test_pull_is_idempotent() {
    let bytes = b"mp4 payload".to_vec();
    let v = video("vid-1", &bytes, Some("https://records.example/thumb.png"));

    let mut source = FakeSource::default();
    source
        .resources
        .insert(v.attachment.source_location.clone(), bytes);
    source
        .resources
        .insert("https://records.example/thumb.png".to_string(), png_bytes());
    source.published.push(v);

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);

    let first = engine.pull(false).await.unwrap();
    assert_eq!(first.videos, 1);
    assert_eq!(first.attachments_downloaded, 1);
    assert_eq!(first.thumbnails_stored, 1);
    assert_eq!(source.download_count(), 1);
    assert_eq!(source.fetch_count(), 1);

    // Second pull without force performs no network transfers at all.
    let second = engine.pull(false).await.unwrap();
    assert_eq!(second.attachments_downloaded, 0);
    assert_eq!(second.thumbnails_stored, 0);
    assert_eq!(source.download_count(), 1);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_stale_attachment_is_redownloaded() {
    let bytes = b"original payload".to_vec();
    let v = video("vid-1", &bytes, None);
    let hash = v.attachment.content_hash.clone();

    let mut source = FakeSource::default();
    source
        .resources
        .insert(v.attachment.source_location.clone(), bytes.clone());
    source.published.push(v);

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    engine.pull(false).await.unwrap();
    assert_eq!(source.download_count(), 1);

    // Corrupt the cached copy; the recorded hash no longer matches.
    std::fs::write(fx.attachments.path(&hash), b"truncated").unwrap();

    let report = engine.pull(false).await.unwrap();
    assert_eq!(report.attachments_downloaded, 1);
    assert_eq!(source.download_count(), 2);
    assert_eq!(std::fs::read(fx.attachments.path(&hash)).unwrap(), bytes);
}

#[tokio::test]
async fn test_thumbnail_normalized_to_jpeg_once() {
    let bytes = b"payload".to_vec();
    let v = video("vid-1", &bytes, Some("https://records.example/thumb.png"));

    let mut source = FakeSource::default();
    source
        .resources
        .insert(v.attachment.source_location.clone(), bytes);
    source
        .resources
        .insert("https://records.example/thumb.png".to_string(), png_bytes());
    source.published.push(v.clone());

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    engine.pull(false).await.unwrap();

    let stored = std::fs::read(fx.thumbnails.path(&v.thumbnail_filename())).unwrap();
    assert_eq!(
        image::guess_format(&stored).unwrap(),
        image::ImageFormat::Jpeg
    );

    // No reconversion on the second pull.
    engine.pull(false).await.unwrap();
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_data_uri_thumbnail_needs_no_fetch() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let bytes = b"payload".to_vec();
    let uri = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));
    let v = video("vid-1", &bytes, Some(&uri));

    let mut source = FakeSource::default();
    source
        .resources
        .insert(v.attachment.source_location.clone(), bytes);
    source.published.push(v.clone());

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    let report = engine.pull(false).await.unwrap();

    assert_eq!(report.thumbnails_stored, 1);
    assert_eq!(source.fetch_count(), 0);
    let stored = std::fs::read(fx.thumbnails.path(&v.thumbnail_filename())).unwrap();
    assert_eq!(
        image::guess_format(&stored).unwrap(),
        image::ImageFormat::Jpeg
    );
}

#[tokio::test]
async fn test_missing_thumbnail_is_not_a_failure() {
    let bytes = b"payload".to_vec();
    let v = video("vid-1", &bytes, Some("https://records.example/gone.png"));

    let mut source = FakeSource::default();
    source
        .resources
        .insert(v.attachment.source_location.clone(), bytes);
    source.published.push(v.clone());

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    let report = engine.pull(false).await.unwrap();

    assert_eq!(report.videos, 1);
    assert_eq!(report.failures, 0);
    assert!(!fx.thumbnails.has(&v.thumbnail_filename()));
    // The video itself is cached regardless.
    assert!(fx
        .cache
        .load::<Video>("vid-1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_pending_videos_are_quarantined() {
    let bytes = b"payload".to_vec();
    let v = video("vid-1", &bytes, None);

    let mut source = FakeSource::default();
    source
        .resources
        .insert(v.attachment.source_location.clone(), bytes);
    source.pending.push(v);

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    engine.pull(false).await.unwrap();

    let cached: Video = fx.cache.load("vid-1").await.unwrap().unwrap();
    assert!(cached.quarantined);
}

#[tokio::test]
async fn test_one_failing_download_does_not_abort_the_batch() {
    let good_bytes = b"good payload".to_vec();
    let good = video("vid-1", &good_bytes, None);
    // vid-2's attachment URL is not served by the fake: download fails.
    let bad = video("vid-2", b"never served", None);

    let mut source = FakeSource::default();
    source
        .resources
        .insert(good.attachment.source_location.clone(), good_bytes);
    source.published.push(good.clone());
    source.published.push(bad);

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    let report = engine.pull(false).await.unwrap();

    assert_eq!(report.videos, 1);
    assert_eq!(report.failures, 1);
    assert!(fx.attachments.has(&good.attachment.content_hash));
}

#[tokio::test]
async fn test_profiles_are_cached() {
    let mut source = FakeSource::default();
    source.profiles.push(Profile {
        id: "prof-1".to_string(),
        email: "marie@example.org".to_string(),
        display_name: "Marie".to_string(),
        bio: "CE2".to_string(),
        last_modified: None,
    });

    let fx = Fixture::new();
    let engine = PullEngine::new(&source, &fx.cache, &fx.attachments, &fx.thumbnails);
    let report = engine.pull(false).await.unwrap();

    assert_eq!(report.profiles, 1);
    let cached: Profile = fx.cache.load("prof-1").await.unwrap().unwrap();
    assert_eq!(cached.email, "marie@example.org");
}
