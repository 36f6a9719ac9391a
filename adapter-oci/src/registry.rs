//! Manifest resolution against the registry v2 HTTP API.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::BearerTokenAuthorizer;
use crate::error::{OciError, Result};
use crate::manifest::{
    ImageManifest, ManifestList, MediaKind, Platform, MEDIA_TYPE_DOCKER_MANIFEST,
    MEDIA_TYPE_DOCKER_MANIFEST_LIST, MEDIA_TYPE_OCI_INDEX, MEDIA_TYPE_OCI_MANIFEST,
};

/// `<registry>/v2/<repository>/blobs/<digest>`, the URL a blob is pulled from.
pub fn blob_url(registry_url: &str, repository: &str, digest: &str) -> String {
    format!(
        "{}/v2/{}/blobs/{}",
        registry_url.trim_end_matches('/'),
        repository,
        digest
    )
}

/// Registry client bound to one registry endpoint and one credential.
///
/// `reqwest::Client` owns the connection pool and clones share it, so binding
/// a fresh `RegistryClient` per scan request costs nothing.
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    authorizer: BearerTokenAuthorizer,
    platform: Platform,
}

impl RegistryClient {
    /// Manifest lists resolve to their `linux/amd64` entry.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        authorizer: BearerTokenAuthorizer,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorizer,
            platform: Platform::default(),
        }
    }

    fn manifest_url(&self, repository: &str, reference: &str) -> String {
        format!("{}/v2/{}/manifests/{}", self.base_url, repository, reference)
    }

    /// Fetch whatever document is stored under `reference`.
    pub async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<FetchedManifest> {
        let url = self.manifest_url(repository, reference);
        let (content_type, body) = self.get(&url).await?;
        FetchedManifest::decode(&content_type, &body, reference)
    }

    /// Resolve `reference` to a single-platform manifest, following one
    /// level of manifest list for the configured platform.
    pub async fn resolve_manifest(&self, repository: &str, reference: &str) -> Result<ImageManifest> {
        let list = match self.fetch_manifest(repository, reference).await? {
            FetchedManifest::Image(m) => return Ok(m),
            FetchedManifest::List(list) => list,
        };

        let entry = list
            .manifest_for(&self.platform)
            .ok_or_else(|| OciError::NoMatchingPlatform(self.platform.to_string()))?;
        info!(
            repository,
            reference,
            digest = %entry.digest,
            platform = %self.platform,
            "resolved manifest list entry",
        );

        match self.fetch_manifest(repository, &entry.digest).await? {
            FetchedManifest::Image(m) => Ok(m),
            FetchedManifest::List(_) => Err(OciError::UnsupportedManifest(format!(
                "{} is a manifest list nested in {}",
                entry.digest, reference
            ))),
        }
    }

    /// Authenticated manifest GET. Returns the response `Content-Type` and
    /// body.
    async fn get(&self, url: &str) -> Result<(String, Vec<u8>)> {
        let accept = [
            MEDIA_TYPE_OCI_MANIFEST,
            MEDIA_TYPE_DOCKER_MANIFEST,
            MEDIA_TYPE_OCI_INDEX,
            MEDIA_TYPE_DOCKER_MANIFEST_LIST,
        ]
        .join(", ");

        debug!(%url, "GET manifest");
        let resp = self
            .authorizer
            .authorize(self.http.get(url))
            .header(ACCEPT, accept)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => {
                let content_type = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Ok((content_type, resp.bytes().await?.to_vec()))
            }
            s @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Err(OciError::Unauthorized {
                url: url.to_string(),
                status: s.as_u16(),
            }),
            StatusCode::NOT_FOUND => Err(OciError::NotFound(url.to_string())),
            s => Err(OciError::Status {
                url: url.to_string(),
                status: s.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// A manifest endpoint's answer.
#[derive(Debug)]
pub enum FetchedManifest {
    Image(ImageManifest),
    List(ManifestList),
}

impl FetchedManifest {
    /// Classify by the document's own `mediaType`, then the response
    /// `Content-Type`, then its shape. Schema 1 manifests match none of these.
    fn decode(content_type: &str, body: &[u8], reference: &str) -> Result<Self> {
        let doc: Value = serde_json::from_slice(body)?;
        let declared = doc
            .get("mediaType")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(content_type)
            .to_string();

        match MediaKind::of(&declared) {
            MediaKind::List => Ok(Self::List(serde_json::from_value(doc)?)),
            MediaKind::Image => Ok(Self::Image(serde_json::from_value(doc)?)),
            _ if doc.get("manifests").is_some() => Ok(Self::List(serde_json::from_value(doc)?)),
            _ if doc.get("config").is_some() => Ok(Self::Image(serde_json::from_value(doc)?)),
            _ => Err(OciError::UnsupportedManifest(if declared.is_empty() {
                format!("{} has no config descriptor", reference)
            } else {
                format!("{} has media type {}", reference, declared)
            })),
        }
    }
}
