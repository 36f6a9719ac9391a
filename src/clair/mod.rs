//! Clair v2 API model and client.
//!
//! Clair indexes images one layer at a time. Each layer is registered with a
//! `Name` and the `ParentName` of the layer below it, and Clair resolves the
//! full filesystem by walking that parent chain. The adapter therefore only
//! ever talks to Clair in terms of [`ClairLayer`]s.

pub mod client;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use client::ClairClient;

// ---------------------------------------------------------------------------
// Severity labels
// ---------------------------------------------------------------------------

/// Lowercase severity labels as emitted by Clair's vulnerability sources.
pub mod severity {
    pub const UNKNOWN: &str = "unknown";
    pub const NEGLIGIBLE: &str = "negligible";
    pub const NONE: &str = "none";
    pub const LOW: &str = "low";
    pub const MEDIUM: &str = "medium";
    pub const HIGH: &str = "high";
    pub const CRITICAL: &str = "critical";
    pub const DEFCON1: &str = "defcon1";
}

/// Layer format understood by Clair's Docker image fetcher.
pub const LAYER_FORMAT_DOCKER: &str = "Docker";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Envelope wrapping every Clair v2 request and response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClairLayerEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<ClairLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClairError>,
}

impl ClairLayerEnvelope {
    /// Features of the wrapped layer, empty when the layer or its feature
    /// list is absent.
    pub fn features(&self) -> &[ClairFeature] {
        self.layer
            .as_ref()
            .and_then(|l| l.features.as_deref())
            .unwrap_or(&[])
    }
}

/// A layer as registered with, and returned by, Clair.
///
/// `Headers` carries the registry credential Clair needs to pull the blob,
/// so `Debug` prints header names only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClairLayer {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub indexed_by_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<ClairFeature>>,
}

impl fmt::Debug for ClairLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClairLayer")
            .field("name", &self.name)
            .field("namespace_name", &self.namespace_name)
            .field("path", &self.path)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("parent_name", &self.parent_name)
            .field("format", &self.format)
            .field("indexed_by_version", &self.indexed_by_version)
            .field("features", &self.features)
            .finish()
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// An installed package detected in a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClairFeature {
    pub name: String,
    #[serde(default)]
    pub namespace_name: String,
    #[serde(default)]
    pub version_format: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerabilities: Option<Vec<ClairVulnerability>>,
    #[serde(default)]
    pub added_by: String,
}

impl ClairFeature {
    pub fn vulnerabilities(&self) -> &[ClairVulnerability] {
        self.vulnerabilities.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClairVulnerability {
    pub name: String,
    #[serde(default)]
    pub namespace_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub fixed_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClairError {
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Operations the adapter needs from Clair.
///
/// Implementations must surface an unknown layer name from
/// [`get_result`](ClairBackend::get_result) as [`Error::NotFound`](crate::Error::NotFound).
#[async_trait::async_trait]
pub trait ClairBackend: Send + Sync {
    /// Register a layer for indexing. The parent layer must already be known.
    async fn scan_layer(&self, layer: &ClairLayer) -> Result<()>;

    /// Fetch a layer together with its features and their vulnerabilities.
    async fn get_result(&self, layer_name: &str) -> Result<ClairLayerEnvelope>;
}
