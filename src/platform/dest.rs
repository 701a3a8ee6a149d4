//! HTTP client for the destination video-hosting API.
//!
//! Authentication is the OAuth2 resource-owner-password flow: fetch the
//! local client id/secret once per login, then exchange username and
//! password for a bearer token. Administrative calls use the system
//! account's token; uploads use a token for the resolved owner.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{MigrateError, Result};

use super::{response_error, AccessToken, Destination, VideoUpload};

/// Destination visibility setting: publicly listed.
const PRIVACY_PUBLIC: u8 = 1;

/// Regular (non-moderator) user role.
const ROLE_USER: u8 = 2;

pub struct DestinationClient {
    api_url: String,
    password: String,
    category: u16,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OauthClient {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(rename = "videoChannels")]
    video_channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    video: UploadedVideo,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    uuid: Uuid,
}

impl DestinationClient {
    /// `api_url` is the versioned API root, e.g. `https://tube.example/api/v1`.
    /// `password` is shared by the system account and every account this
    /// tool creates.
    pub fn new(api_url: impl Into<String>, password: impl Into<String>, category: u16) -> Self {
        Self {
            api_url: api_url.into(),
            password: password.into(),
            category,
            client: reqwest::Client::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn ok(&self, resp: reqwest::Response, resource: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(response_error(resp, resource).await)
        }
    }
}

#[async_trait]
impl Destination for DestinationClient {
    async fn login(&self, username: &str) -> Result<AccessToken> {
        let resp = self
            .client
            .get(self.endpoint("oauth-clients/local"))
            .send()
            .await?;
        let oauth: OauthClient = self.ok(resp, "oauth client").await?.json().await?;

        let resp = self
            .client
            .post(self.endpoint("users/token"))
            .form(&[
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
                ("grant_type", "password"),
                ("response_type", "code"),
                ("username", username),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = self
            .ok(resp, &format!("token for {username}"))
            .await?
            .json()
            .await?;

        Ok(AccessToken::new(username, token.access_token))
    }

    async fn account_exists(&self, username: &str) -> Result<bool> {
        let resp = self
            .client
            .get(self.endpoint(&format!("accounts/{username}")))
            .send()
            .await?;
        match resp.status().as_u16() {
            404 => Ok(false),
            _ => {
                self.ok(resp, &format!("account {username}")).await?;
                Ok(true)
            }
        }
    }

    async fn create_account(
        &self,
        admin: &AccessToken,
        email: &str,
        username: &str,
    ) -> Result<()> {
        let email = email.to_lowercase();
        let role = ROLE_USER.to_string();
        let params = [
            ("username", username),
            ("email", email.as_str()),
            ("password", self.password.as_str()),
            ("role", role.as_str()),
            // Migrated accounts keep their full back catalog.
            ("videoQuota", "-1"),
            ("videoQuotaDaily", "-1"),
        ];

        let resp = self
            .client
            .post(self.endpoint("users"))
            .bearer_auth(admin.bearer())
            .form(&params)
            .send()
            .await?;
        self.ok(resp, &format!("account {username}")).await?;
        Ok(())
    }

    async fn update_account_details(
        &self,
        token: &AccessToken,
        display_name: &str,
        bio: &str,
    ) -> Result<()> {
        let resp = self
            .client
            .put(self.endpoint("users/me"))
            .bearer_auth(token.bearer())
            .form(&[("displayName", display_name), ("bio", bio)])
            .send()
            .await?;
        self.ok(resp, &format!("account details for {}", token.username()))
            .await?;
        Ok(())
    }

    async fn default_channel(&self, token: &AccessToken) -> Result<u64> {
        let resp = self
            .client
            .get(self.endpoint("users/me"))
            .bearer_auth(token.bearer())
            .send()
            .await?;
        let me: MeResponse = self
            .ok(resp, &format!("user {}", token.username()))
            .await?
            .json()
            .await?;

        me.video_channels
            .first()
            .map(|c| c.id)
            .ok_or_else(|| MigrateError::Malformed {
                what: format!("user {}", token.username()),
                detail: "no upload channel".to_string(),
            })
    }

    async fn video_exists(&self, id: &Uuid) -> Result<bool> {
        let resp = self
            .client
            .get(self.endpoint(&format!("videos/{id}")))
            .send()
            .await?;
        match resp.status().as_u16() {
            404 => Ok(false),
            _ => {
                self.ok(resp, &format!("video {id}")).await?;
                Ok(true)
            }
        }
    }

    async fn upload_video(&self, token: &AccessToken, upload: &VideoUpload) -> Result<Uuid> {
        let meta = &upload.metadata;

        let video_bytes = tokio::fs::read(&upload.video_path).await?;
        let video_part = Part::bytes(video_bytes)
            .file_name(upload.video_filename.clone())
            .mime_str(&upload.video_mime)?;

        let mut form = Form::new()
            .text("name", meta.name.clone())
            .text("channelId", meta.channel_id.to_string())
            .text("description", meta.description.clone())
            .text("privacy", PRIVACY_PUBLIC.to_string())
            .text("commentsEnabled", "true")
            .text("category", self.category.to_string())
            .part("videofile", video_part);

        for tag in &meta.tags {
            form = form.text("tags[]", tag.clone());
        }

        if let Some(published_at) = meta.originally_published_at {
            form = form.text("originallyPublishedAt", published_at.to_rfc3339());
        }

        if let Some(thumbnail) = &upload.thumbnail {
            let bytes = tokio::fs::read(&thumbnail.path).await?;
            for field in ["previewfile", "thumbnailfile"] {
                let part = Part::bytes(bytes.clone())
                    .file_name(thumbnail.filename.clone())
                    .mime_str("image/jpeg")?;
                form = form.part(field, part);
            }
        }

        let resp = self
            .client
            .post(self.endpoint("videos/upload"))
            .bearer_auth(token.bearer())
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = self
            .ok(resp, &format!("upload of {}", meta.name))
            .await?
            .json()
            .await?;

        Ok(uploaded.video.uuid)
    }

    async fn clear_moderation_hold(&self, admin: &AccessToken, id: &Uuid) -> Result<()> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("videos/{id}/blacklist")))
            .bearer_auth(admin.bearer())
            .send()
            .await?;
        self.ok(resp, &format!("moderation hold on {id}")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_api_root() {
        let client = DestinationClient::new("https://tube.example/api/v1", "secret", 13);
        assert_eq!(
            client.endpoint("videos/upload"),
            "https://tube.example/api/v1/videos/upload"
        );
    }

    #[test]
    fn test_upload_response_parses() {
        let raw = serde_json::json!({
            "video": {
                "id": 42,
                "uuid": "9c9de5e8-0a1e-484a-b099-e80766180a6d"
            }
        });
        let parsed: UploadResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(
            parsed.video.uuid.to_string(),
            "9c9de5e8-0a1e-484a-b099-e80766180a6d"
        );
    }
}
