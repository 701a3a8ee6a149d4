//! HTTP client for the source records API.
//!
//! Collections are read through paginated GETs: each page is a JSON
//! `data` array, with a `Next-Page` header pointing at the continuation
//! until the collection is exhausted. All reads use basic auth.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{Profile, Video};
use crate::error::Result;
use crate::store::StagedWrite;

use super::{response_error, Source};

const NEXT_PAGE_HEADER: &str = "Next-Page";

pub struct SourceClient {
    base_url: String,
    bucket: String,
    username: String,
    password: String,
    page_size: usize,
    client: reqwest::Client,
}

/// Envelope every records endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
struct Data<T> {
    data: T,
}

/// One row of the accounts listing. The account id is the email address.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: String,
    #[serde(default)]
    validated: bool,
    #[serde(default)]
    profile: Option<String>,
}

impl SourceClient {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            bucket: bucket.into(),
            username: username.into(),
            password: password.into(),
            page_size,
            client: reqwest::Client::new(),
        }
    }

    fn records_url(&self, collection: &str) -> String {
        format!(
            "{}/buckets/{}/collections/{}/records?_limit={}",
            self.base_url, self.bucket, collection, self.page_size
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(response_error(resp, url).await);
        }
        Ok(resp)
    }

    /// Follow `Next-Page` links until the listing is exhausted.
    async fn paged<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut url = first_url;
        let mut records = Vec::new();

        loop {
            let resp = self.get(&url).await?;
            let next = resp
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let page: Data<Vec<serde_json::Value>> = resp.json().await?;
            for raw in page.data {
                match serde_json::from_value(raw) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping malformed record from {}: {}", url, e),
                }
            }

            match next {
                Some(n) => url = n,
                None => break,
            }
        }

        Ok(records)
    }

    async fn profile_record(&self, id: &str) -> Result<Profile> {
        let url = format!(
            "{}/buckets/{}/collections/profiles/records/{}",
            self.base_url, self.bucket, id
        );
        let resp = self.get(&url).await?;
        let body: Data<Profile> = resp.json().await?;
        Ok(body.data)
    }
}

#[async_trait]
impl Source for SourceClient {
    async fn published_videos(&self) -> Result<Vec<Video>> {
        self.paged(self.records_url("videos")).await
    }

    async fn pending_videos(&self) -> Result<Vec<Video>> {
        self.paged(self.records_url("upcoming")).await
    }

    async fn profiles(&self) -> Result<Vec<Profile>> {
        let accounts: Vec<AccountRecord> = self
            .paged(format!("{}/accounts", self.base_url))
            .await?;

        let mut profiles = Vec::new();
        for account in accounts {
            let Some(profile_id) = account.profile else {
                continue;
            };
            if !account.validated {
                continue;
            }
            match self.profile_record(&profile_id).await {
                Ok(mut profile) => {
                    // The profile record itself has no email; the account
                    // id is the address.
                    profile.email = account.id;
                    profiles.push(profile);
                }
                Err(e) if e.is_not_found() => {
                    warn!("Account {} points at missing profile {}", account.id, profile_id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(profiles)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(response_error(resp, url).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn download(&self, url: &str, dest: &mut StagedWrite) -> Result<u64> {
        let mut resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(response_error(resp, url).await);
        }

        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }
}
