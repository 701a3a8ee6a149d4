//! Video ownership resolution.
//!
//! The ownership table (video id → owner email) is produced offline by
//! matching a spreadsheet of names against cached video titles, then
//! consumed read-only at push time. At push time resolution is a pure
//! lookup: recorded owner email → cached profile → derived username,
//! falling back to the system account when either link is missing.

use std::collections::HashMap;
use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::domain::{Profile, Video};
use crate::error::Result;

/// Table file name under the cache root.
pub const TABLE_FILE: &str = "ownership.json";

#[derive(Debug, Default)]
pub struct OwnershipTable {
    map: HashMap<String, String>,
}

impl OwnershipTable {
    /// Load the table, or start empty when it was never built; every
    /// video then falls back to the system account.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "No ownership table at {}; all videos will use the system account",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await?;
        Ok(Self {
            map: serde_json::from_str(&content)?,
        })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.map)?).await?;
        Ok(())
    }

    pub fn owner_email(&self, video_id: &str) -> Option<&str> {
        self.map.get(video_id).map(String::as_str)
    }

    pub fn insert(&mut self, video_id: impl Into<String>, email: impl Into<String>) {
        self.map.insert(video_id.into(), email.into());
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Build the table from a `;`-delimited spreadsheet export with
    /// `name` and `email` columns, matching names against cached video
    /// titles. One-time preprocessing; push never calls this.
    pub fn build_from_csv(
        csv_path: &Path,
        videos: &[Video],
        profiles: &[Profile],
    ) -> Result<Self> {
        let known_emails: HashMap<&str, &Profile> =
            profiles.iter().map(|p| (p.email.as_str(), p)).collect();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_path(csv_path)?;

        let mut table = Self::default();
        for row in reader.deserialize() {
            let row: SpreadsheetRow = row?;
            if row.email.is_empty() {
                continue;
            }
            if !known_emails.contains_key(row.email.as_str()) {
                warn!("Unknown owner {} for '{}'", row.email, row.name);
            }

            let wanted = normalize_title(&row.name);
            match videos.iter().find(|v| normalize_title(&v.title) == wanted) {
                Some(video) => {
                    info!("Matched '{}' to video {}", row.name, video.id);
                    table.insert(&video.id, &row.email);
                }
                None => warn!("No cached video matches '{}'", row.name),
            }
        }

        Ok(table)
    }
}

#[derive(Debug, serde::Deserialize)]
struct SpreadsheetRow {
    name: String,
    #[serde(default)]
    email: String,
}

/// Resolve the destination username a video should be uploaded as.
pub fn resolve_owner(
    video: &Video,
    table: &OwnershipTable,
    profiles_by_email: &HashMap<String, Profile>,
    default_username: &str,
) -> String {
    let Some(email) = table.owner_email(&video.id) else {
        return default_username.to_string();
    };

    match profiles_by_email.get(email) {
        Some(profile) => profile.username(),
        None => {
            warn!(
                "Owner {} of video {} has no cached profile; using {}",
                email,
                video.describe(),
                default_username
            );
            default_username.to_string()
        }
    }
}

/// Strip everything but word characters and lower-case, so spreadsheet
/// names and video titles compare despite punctuation and casing drift.
fn normalize_title(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}
