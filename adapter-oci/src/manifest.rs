//! Image manifest and manifest-list documents, as served by
//! `GET /v2/<name>/manifests/<reference>`.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str =
    "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";

/// What a media type names, as far as manifest resolution cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Multi-platform index or Docker manifest list.
    List,
    /// Single-platform image manifest.
    Image,
    /// Image configuration blob.
    Config,
    /// Anything else, normally a filesystem layer.
    Layer,
}

impl MediaKind {
    pub fn of(media_type: &str) -> Self {
        // Parameters such as `; charset=utf-8` do not change the kind.
        let essence = media_type.split(';').next().unwrap_or("").trim();
        match essence {
            MEDIA_TYPE_OCI_INDEX | MEDIA_TYPE_DOCKER_MANIFEST_LIST => Self::List,
            MEDIA_TYPE_OCI_MANIFEST | MEDIA_TYPE_DOCKER_MANIFEST => Self::Image,
            MEDIA_TYPE_OCI_CONFIG | MEDIA_TYPE_DOCKER_CONFIG => Self::Config,
            _ => Self::Layer,
        }
    }
}

/// A single-platform image manifest: one config blob plus the filesystem
/// layers, base first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,

    #[serde(default)]
    pub media_type: String,

    pub config: Descriptor,

    // A config-only image omits the field entirely.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    /// Every blob the manifest references, config first and then layers in
    /// application order.
    pub fn references(&self) -> Vec<&Descriptor> {
        std::iter::once(&self.config)
            .chain(self.layers.iter())
            .collect()
    }
}

/// Pointer to a blob or manifest by digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Descriptor {
    pub fn kind(&self) -> MediaKind {
        MediaKind::of(&self.media_type)
    }

    pub fn is_config(&self) -> bool {
        self.kind() == MediaKind::Config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// A wanted platform with no variant accepts every variant of the same
    /// os/architecture.
    pub fn accepts(&self, candidate: &Platform) -> bool {
        self.os == candidate.os
            && self.architecture == candidate.architecture
            && (self.variant.is_none() || self.variant == candidate.variant)
    }
}

impl Default for Platform {
    /// `linux/amd64`: Clair v2 only ships package detectors for Linux
    /// distributions.
    fn default() -> Self {
        Self {
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            variant: None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// Multi-platform index (OCI) or manifest list (Docker).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    pub manifests: Vec<Descriptor>,
}

impl ManifestList {
    /// First entry built for `wanted`. Entries without a platform never match.
    pub fn manifest_for(&self, wanted: &Platform) -> Option<&Descriptor> {
        self.manifests
            .iter()
            .find(|d| d.platform.as_ref().is_some_and(|p| wanted.accepts(p)))
    }
}
