//! GitHub Gist adapter.
//!
//! The document is one private gist; the file [`GIST_FILENAME`] holds the
//! JSON-encoded package (or, for legacy gists, the bare document).

use std::collections::HashMap;

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{RemoteDocumentStore, RemoteMetadata};
use crate::package::{parse_package_file, VersionedPackage};
use crate::util::{error_excerpt, is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const GIST_FILENAME: &str = "family-points-data.json";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("family-points/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct GistClient {
    base_url: String,
    credential: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GistClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GistClient")
            .field("base_url", &self.base_url)
            .field("credential", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GistClient {
    /// Client for the public GitHub API.
    pub fn new(credential: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE, credential)
    }

    /// Client for a GitHub-compatible API at `base_url`.
    pub fn with_base_url(
        base_url: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let credential = normalize_text_option(Some(credential.into()))
            .ok_or_else(|| Error::Config("credential must not be empty".to_string()))?;
        Ok(Self {
            base_url,
            credential,
            client: reqwest::Client::builder().user_agent(USER_AGENT).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn gist_url(&self, remote_id: &str) -> String {
        format!(
            "{}/gists/{}",
            self.base_url,
            urlencoding::encode(remote_id.trim())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.credential)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
    }

    async fn get_gist(&self, remote_id: &str, operation: &str) -> Result<GistResponse> {
        let response = self
            .authorized(self.client.get(self.gist_url(remote_id)))
            .send()
            .await
            .map_err(|error| network_error(operation, &error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "{operation} failed: {}",
                parse_api_error(status, &body)
            )));
        }

        response
            .json::<GistResponse>()
            .await
            .map_err(|error| {
                Error::Parse(format!("{operation} failed: invalid gist payload: {error}"))
            })
    }

    /// Content of the data file, following `raw_url` when the API truncated it.
    async fn data_file_content(&self, gist: &GistResponse) -> Result<Option<String>> {
        let Some(file) = gist.files.get(GIST_FILENAME).and_then(Option::as_ref) else {
            return Ok(None);
        };

        if !file.truncated {
            return Ok(file.content.clone().filter(|content| !content.is_empty()));
        }

        let Some(raw_url) = file.raw_url.as_deref() else {
            return Ok(file.content.clone());
        };
        tracing::debug!("Gist data file truncated; fetching raw content");
        let response = self
            .authorized(self.client.get(raw_url))
            .send()
            .await
            .map_err(|error| network_error("Download", &error))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Download failed: {}",
                parse_api_error(status, &body)
            )));
        }
        let content = response
            .text()
            .await
            .map_err(|error| network_error("Download", &error))?;
        Ok(Some(content))
    }

    async fn write_gist(
        &self,
        request: RequestBuilder,
        body: Value,
        operation: &str,
    ) -> Result<GistResponse> {
        let response = self
            .authorized(request)
            .json(&body)
            .send()
            .await
            .map_err(|error| network_error(operation, &error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "{operation} failed: {}",
                parse_api_error(status, &body)
            )));
        }

        response
            .json::<GistResponse>()
            .await
            .map_err(|error| {
                Error::Parse(format!("{operation} failed: invalid gist payload: {error}"))
            })
    }
}

impl RemoteDocumentStore for GistClient {
    async fn fetch_metadata(&self, remote_id: &str) -> Option<RemoteMetadata> {
        let gist = match self.get_gist(remote_id, "Metadata fetch").await {
            Ok(gist) => gist,
            Err(error) => {
                tracing::warn!("{error}");
                return None;
            }
        };

        let package = match self.data_file_content(&gist).await {
            Ok(Some(content)) => parse_package_file(&content)
                .ok()
                .filter(|package| !package.is_migrated()),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("{error}");
                return None;
            }
        };

        Some(RemoteMetadata {
            version: package.as_ref().map(|package| package.version.clone()),
            checksum: package.map(|package| package.checksum),
            updated_at: gist.updated_at,
        })
    }

    async fn fetch_full(&self, remote_id: &str) -> Result<VersionedPackage> {
        let gist = self.get_gist(remote_id, "Download").await?;
        let content = self.data_file_content(&gist).await?.ok_or_else(|| {
            Error::Parse(format!("Download failed: gist has no {GIST_FILENAME} file"))
        })?;
        parse_package_file(&content)
    }

    async fn create(&self, seed: &Value) -> Result<String> {
        let body = json!({
            "description": backup_description(),
            "public": false,
            "files": { GIST_FILENAME: { "content": serde_json::to_string_pretty(seed)? } },
        });
        let gist = self
            .write_gist(self.client.post(format!("{}/gists", self.base_url)), body, "Create")
            .await?;
        tracing::info!("Created remote document {}", gist.id);
        Ok(gist.id)
    }

    async fn replace(&self, remote_id: &str, package: &VersionedPackage) -> Result<()> {
        let body = json!({
            "description": backup_description(),
            "files": { GIST_FILENAME: { "content": package.to_file_content()? } },
        });
        self.write_gist(self.client.patch(self.gist_url(remote_id)), body, "Upload")
            .await?;
        Ok(())
    }

    async fn validate(&self, remote_id: &str) -> bool {
        match self
            .authorized(self.client.get(self.gist_url(remote_id)))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Gist validation request failed: {error}");
                false
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    files: HashMap<String, Option<GistFile>>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = error_excerpt(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn network_error(operation: &str, error: &reqwest::Error) -> Error {
    tracing::debug!("{operation} transport failure: {error}");
    Error::Network(format!("{operation} failed: network error"))
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

fn backup_description() -> String {
    format!(
        "Family Points backup - {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
