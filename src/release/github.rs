//! GitHub-backed release store.
//!
//! Creates a draft release for the version tag and uploads assets through
//! the release upload URL. Authentication uses a bearer token, normally
//! taken from `GITHUB_TOKEN`.

use std::path::Path;

use serde::Deserialize;

use super::store::{ReleaseMeta, ReleaseRecord, ReleaseStore, StoreError};

const API_BASE: &str = "https://api.github.com";

/// Release store talking to the GitHub releases API.
pub struct GitHubReleaseStore {
    client: reqwest::Client,
    owner: String,
    repo: String,
    token: String,
}

#[derive(Deserialize)]
struct CreatedRelease {
    id: u64,
    upload_url: String,
}

#[derive(Deserialize)]
struct ReleaseAsset {
    name: String,
}

#[derive(Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    draft: bool,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

impl GitHubReleaseStore {
    /// Builds a store for `owner/repo` with the given API token.
    pub fn new(repo_slug: &str, token: String) -> Result<Self, StoreError> {
        let (owner, repo) = repo_slug
            .split_once('/')
            .ok_or_else(|| StoreError::Create(format!("invalid repository '{repo_slug}', expected OWNER/REPO")))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("gauge-release/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Create(e.to_string()))?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
        })
    }

    fn releases_url(&self) -> String {
        format!("{API_BASE}/repos/{}/{}/releases", self.owner, self.repo)
    }
}

impl ReleaseStore for GitHubReleaseStore {
    async fn create(&self, version: &str) -> Result<ReleaseRecord, StoreError> {
        let response = self
            .client
            .post(self.releases_url())
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "tag_name": version,
                "name": version,
                "draft": true,
            }))
            .send()
            .await
            .map_err(|e| StoreError::Create(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Create(format!(
                "GitHub returned {} creating release {version}",
                response.status()
            )));
        }

        let created: CreatedRelease = response
            .json()
            .await
            .map_err(|e| StoreError::Create(e.to_string()))?;

        // The upload URL arrives as an RFC 6570 template; everything from
        // the '{' is the optional parameter list.
        let upload_url = created
            .upload_url
            .split('{')
            .next()
            .unwrap_or("")
            .to_string();

        log::info!("created draft release {version} (id {})", created.id);
        Ok(ReleaseRecord {
            version: version.to_string(),
            record_id: created.id.to_string(),
            upload_url,
            draft: true,
        })
    }

    async fn attach(
        &self,
        record: &ReleaseRecord,
        asset: &Path,
        name: &str,
    ) -> Result<(), StoreError> {
        let attach_err = |reason: String| StoreError::Attach {
            asset: name.to_string(),
            reason,
        };

        let data = tokio::fs::read(asset)
            .await
            .map_err(|e| attach_err(e.to_string()))?;

        let response = self
            .client
            .post(&record.upload_url)
            .query(&[("name", name)])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| attach_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(attach_err(format!("GitHub returned {}", response.status())));
        }

        log::info!("✓ Uploaded {name}");
        Ok(())
    }

    async fn read(&self, record: &ReleaseRecord) -> Result<ReleaseMeta, StoreError> {
        let response = self
            .client
            .get(format!("{}/{}", self.releases_url(), record.record_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Read(format!(
                "GitHub returned {}",
                response.status()
            )));
        }

        let release: ReleaseResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        Ok(ReleaseMeta {
            version: release.tag_name,
            draft: release.draft,
            assets: release.assets.into_iter().map(|a| a.name).collect(),
        })
    }
}
