//! Harbor pluggable-scanner wire model (scanner adapter API v1.0).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MIME_TYPE_METADATA: &str = "application/vnd.scanner.adapter.metadata+json; version=1.0";
pub const MIME_TYPE_SCAN_REQUEST: &str =
    "application/vnd.scanner.adapter.scan.request+json; version=1.0";
pub const MIME_TYPE_SCAN_RESPONSE: &str =
    "application/vnd.scanner.adapter.scan.response+json; version=1.0";
pub const MIME_TYPE_HARBOR_REPORT: &str =
    "application/vnd.scanner.adapter.vuln.report.harbor+json; version=1.0";
pub const MIME_TYPE_RAW_REPORT: &str = "application/vnd.scanner.adapter.vuln.report.raw";
pub const MIME_TYPE_ERROR: &str = "application/vnd.scanner.adapter.error+json; version=1.0";

pub const MIME_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MIME_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

// ---------------------------------------------------------------------------
// Scan request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub registry: Registry,
    pub artifact: Artifact,
}

impl ScanRequest {
    /// Reject requests that cannot possibly be scanned before any network
    /// call is made.
    pub fn validate(&self) -> Result<()> {
        if self.registry.url.trim().is_empty() {
            return Err(Error::InvalidRequest("missing registry.url".into()));
        }
        if self.artifact.repository.trim().is_empty() {
            return Err(Error::InvalidRequest("missing artifact.repository".into()));
        }
        if self.artifact.digest.trim().is_empty() {
            return Err(Error::InvalidRequest("missing artifact.digest".into()));
        }
        Ok(())
    }
}

/// Registry the artifact lives in, plus the credential Harbor issued for it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registry {
    pub url: String,
    #[serde(default)]
    pub authorization: String,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("url", &self.url)
            .field("authorization", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub repository: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Harbor-facing severity scale.
///
/// Declaration order is the ranking: `None < Unknown < Low < Medium < High`.
/// `High` is the top of the scale, so Clair's `Critical` has nowhere else to
/// go and is folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    None,
    Unknown,
    Low,
    Medium,
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::None
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "None",
            Severity::Unknown => "Unknown",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Vulnerability report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner: Option<Scanner>,
    pub severity: Severity,
    pub vulnerabilities: Vec<VulnerabilityItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityItem {
    pub id: String,
    pub package: String,
    pub version: String,
    #[serde(default)]
    pub fix_version: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub links: Vec<String>,
}

// ---------------------------------------------------------------------------
// Scanner metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scanner {
    pub name: String,
    pub vendor: String,
    pub version: String,
}

impl Scanner {
    pub fn clair(version: impl Into<String>) -> Self {
        Self {
            name: "Clair".to_string(),
            vendor: "CoreOS".to_string(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub consumes_mime_types: Vec<String>,
    pub produces_mime_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerMetadata {
    pub scanner: Scanner,
    pub capabilities: Vec<Capability>,
    pub properties: BTreeMap<String, String>,
}

impl ScannerMetadata {
    pub fn new(scanner: Scanner) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            "harbor.scanner-adapter/scanner-type".to_string(),
            "os-package-vulnerability".to_string(),
        );
        Self {
            scanner,
            capabilities: vec![Capability {
                consumes_mime_types: vec![
                    MIME_TYPE_OCI_MANIFEST.to_string(),
                    MIME_TYPE_DOCKER_MANIFEST.to_string(),
                ],
                produces_mime_types: vec![
                    MIME_TYPE_HARBOR_REPORT.to_string(),
                    MIME_TYPE_RAW_REPORT.to_string(),
                ],
            }],
            properties,
        }
    }
}
