use std::time::Duration;

use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use super::{ClairBackend, ClairLayer, ClairLayerEnvelope};
use crate::{Error, Result};

/// reqwest-backed client for the Clair v2 REST API.
#[derive(Clone)]
pub struct ClairClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ClairClient {
    /// Create a client for the Clair API at `base_url` (e.g.
    /// `http://clair:6060`). `timeout` bounds every individual request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid Clair URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid Clair URL '{}'", base_url)));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("clair-adapter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// `base` joined with `segments`, each pushed as one escaped path
    /// segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn layers_url(&self) -> Url {
        self.endpoint(&["v1", "layers"])
    }

    fn layer_url(&self, name: &str) -> Url {
        let mut url = self.endpoint(&["v1", "layers", name]);
        url.set_query(Some("features&vulnerabilities"));
        url
    }
}

/// Pull Clair's `{"Error":{"Message":...}}` text out of a failed response,
/// falling back to the raw body.
async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ClairLayerEnvelope>(&body)
        .ok()
        .and_then(|env| env.error)
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(body);
    format!("{}: {}", status, message.trim())
}

#[async_trait::async_trait]
impl ClairBackend for ClairClient {
    async fn scan_layer(&self, layer: &ClairLayer) -> Result<()> {
        let envelope = ClairLayerEnvelope {
            layer: Some(layer.clone()),
            error: None,
        };

        debug!(layer = %layer.name, parent = %layer.parent_name, "POST /v1/layers");
        let resp = self
            .client
            .post(self.layers_url())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| Error::Submit {
                layer: layer.name.clone(),
                message: e.to_string(),
            })?;

        if resp.status().is_success() {
            return Ok(());
        }

        let message = error_message(resp).await;
        warn!(layer = %layer.name, %message, "Clair rejected layer");
        Err(Error::Submit {
            layer: layer.name.clone(),
            message,
        })
    }

    async fn get_result(&self, layer_name: &str) -> Result<ClairLayerEnvelope> {
        let resp = self.client.get(self.layer_url(layer_name)).send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(layer_name.to_string())),
            status if status.is_success() => Ok(resp.json::<ClairLayerEnvelope>().await?),
            _ => Err(Error::Backend(format!(
                "GET layer {}: {}",
                layer_name,
                error_message(resp).await
            ))),
        }
    }
}
