use clair_adapter::config::{ClairConfig, Config, RegistryConfig};
use serde_json::{json, Value};

pub const BASE_DIGEST: &str =
    "sha256:a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";
pub const APP_DIGEST: &str =
    "sha256:9d48c3bd43c520dc2784e868a780e976b207cbf493eaff8c6596eb871cbd9609";
pub const IMAGE_DIGEST: &str =
    "sha256:6c3c624b58dbbcd3c0dd82b4c53f04194d1247c6eebdaab7c610cf7d66709b3b";
pub const REPOSITORY: &str = "library/app";
pub const TOKEN: &str = "registry-token";

/// Config pointing the adapter at a mock Clair.
pub fn config(clair_url: &str) -> Config {
    Config {
        clair: ClairConfig {
            url: clair_url.to_string(),
            timeout_secs: 5,
            version: "2.0.8".to_string(),
        },
        registry: RegistryConfig {
            timeout_secs: 5,
            insecure: false,
        },
    }
}

/// Harbor scan request body for the shared image on `registry_url`.
pub fn scan_request_json(registry_url: &str) -> Value {
    json!({
        "registry": { "url": registry_url, "authorization": TOKEN },
        "artifact": {
            "repository": REPOSITORY,
            "digest": IMAGE_DIGEST,
            "mime_type": "application/vnd.docker.distribution.manifest.v2+json"
        }
    })
}

/// Docker v2 manifest with a config blob followed by `layers`.
pub fn docker_manifest(layers: &[&str]) -> Value {
    json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "digest": "sha256:0000000000000000000000000000000000000000000000000000000000000000",
            "size": 1510
        },
        "layers": layers.iter().map(|d| json!({
            "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
            "digest": d,
            "size": 2_000_000
        })).collect::<Vec<_>>()
    })
}

/// Clair's answer for a layer with one vulnerable openssl package and one
/// clean package.
pub fn clair_result(layer_name: &str) -> Value {
    json!({
        "Layer": {
            "Name": layer_name,
            "NamespaceName": "debian:9",
            "IndexedByVersion": 3,
            "Features": [
                {
                    "Name": "openssl",
                    "NamespaceName": "debian:9",
                    "VersionFormat": "dpkg",
                    "Version": "1.0",
                    "Vulnerabilities": [
                        {
                            "Name": "CVE-X",
                            "NamespaceName": "debian:9",
                            "Description": "Heap overflow in openssl",
                            "Link": "https://security-tracker.debian.org/tracker/CVE-X",
                            "Severity": "High",
                            "FixedBy": "1.0.1"
                        }
                    ],
                    "AddedBy": layer_name
                },
                {
                    "Name": "tzdata",
                    "NamespaceName": "debian:9",
                    "VersionFormat": "dpkg",
                    "Version": "2019c-0+deb9u1",
                    "AddedBy": layer_name
                }
            ]
        }
    })
}

pub fn clair_error(message: &str) -> Value {
    json!({ "Error": { "Message": message } })
}
