//! User profile entity.

use serde::{Deserialize, Serialize};

/// A source user profile.
///
/// The source platform keys accounts by email address; the profile record
/// itself does not carry it, so the pull engine injects `email` from the
/// account listing before persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(default)]
    pub bio: String,

    #[serde(default)]
    pub last_modified: Option<i64>,
}

impl Profile {
    /// Destination username, derived from the email local-part.
    ///
    /// Pure and idempotent: recomputed everywhere, never stored. The
    /// destination forbids both upper case and hyphens in usernames.
    pub fn username(&self) -> String {
        self.email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase()
            .replace('-', ".")
    }

    /// Display name as pushed to the destination.
    pub fn upload_display_name(&self) -> String {
        self.display_name.replace('.', " ")
    }
}
