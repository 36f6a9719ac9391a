//! Layer-chain construction.
//!
//! Clair identifies layers by name only, so names must be content derived:
//! each layer is named after the SHA-256 of every layer digest up to and
//! including itself. Two images built on the same base therefore share the
//! names of their common layers, and Clair indexes those layers once.

use std::collections::BTreeMap;
use std::time::Duration;

use adapter_oci::registry::blob_url;
use adapter_oci::{BearerTokenAuthorizer, ImageManifest, RegistryClient};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clair::{ClairLayer, LAYER_FORMAT_DOCKER};
use crate::harbor::ScanRequest;
use crate::Result;

/// Separator appended after every digest in the chain string.
const CHAIN_SEPARATOR: char = '-';

// ---------------------------------------------------------------------------
// ManifestResolver
// ---------------------------------------------------------------------------

/// Fetches the manifest for `repository@digest` from the registry at
/// `registry_url`, authenticating with `authorizer`.
#[async_trait::async_trait]
pub trait ManifestResolver: Send + Sync {
    async fn manifest(
        &self,
        registry_url: &str,
        authorizer: BearerTokenAuthorizer,
        repository: &str,
        digest: &str,
    ) -> Result<ImageManifest>;
}

/// [`ManifestResolver`] backed by the registry v2 API.
///
/// Holds one `reqwest::Client` so all scan requests share a connection pool;
/// a [`RegistryClient`] is bound per request to that request's registry and
/// credential.
#[derive(Clone)]
pub struct RegistryManifestResolver {
    http: reqwest::Client,
}

impl RegistryManifestResolver {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("clair-adapter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl ManifestResolver for RegistryManifestResolver {
    async fn manifest(
        &self,
        registry_url: &str,
        authorizer: BearerTokenAuthorizer,
        repository: &str,
        digest: &str,
    ) -> Result<ImageManifest> {
        let registry = RegistryClient::with_http_client(self.http.clone(), registry_url, authorizer);
        Ok(registry.resolve_manifest(repository, digest).await?)
    }
}

// ---------------------------------------------------------------------------
// Chain construction
// ---------------------------------------------------------------------------

/// Resolve the manifest named by `req` and turn it into an ordered Clair
/// layer chain, base layer first.
///
/// An image whose manifest holds no filesystem layers yields an empty chain;
/// rejecting that is up to the caller.
pub async fn build_chain(resolver: &dyn ManifestResolver, req: &ScanRequest) -> Result<Vec<ClairLayer>> {
    let authorizer = BearerTokenAuthorizer::new(&req.registry.authorization);
    let authorization = (!authorizer.is_anonymous()).then(|| authorizer.header_value());

    let manifest = resolver
        .manifest(
            &req.registry.url,
            authorizer,
            &req.artifact.repository,
            &req.artifact.digest,
        )
        .await?;

    Ok(chain_from_manifest(
        &manifest,
        &req.registry.url,
        &req.artifact.repository,
        authorization.as_deref(),
    ))
}

/// Build the layer chain for an already-resolved manifest.
///
/// `authorization` is the full `Authorization` header value Clair should send
/// when it pulls each blob.
pub fn chain_from_manifest(
    manifest: &ImageManifest,
    registry_url: &str,
    repository: &str,
    authorization: Option<&str>,
) -> Vec<ClairLayer> {
    let mut headers = BTreeMap::new();
    headers.insert("Connection".to_string(), "close".to_string());
    if let Some(value) = authorization {
        headers.insert("Authorization".to_string(), value.to_string());
    }

    let mut chain = String::new();
    let mut layers: Vec<ClairLayer> = Vec::new();

    for desc in manifest.references() {
        if desc.is_config() {
            continue;
        }

        chain.push_str(&desc.digest);
        chain.push(CHAIN_SEPARATOR);

        let layer = ClairLayer {
            name: layer_name(&chain),
            path: blob_url(registry_url, repository, &desc.digest),
            headers: headers.clone(),
            parent_name: layers.last().map(|l| l.name.clone()).unwrap_or_default(),
            format: LAYER_FORMAT_DOCKER.to_string(),
            ..Default::default()
        };
        debug!(layer = %layer.name, digest = %desc.digest, "chained layer");
        layers.push(layer);
    }

    layers
}

/// Lowercase hex SHA-256 of the chain string.
pub fn layer_name(chain: &str) -> String {
    hex_encode(&Sha256::digest(chain.as_bytes()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
