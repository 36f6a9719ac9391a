//! Registry v2 client used by the Clair adapter to resolve image manifests.
//!
//! Blob content is never downloaded here. Clair pulls layers itself from the
//! blob URLs the adapter hands it, so all this crate needs is the manifest.

pub mod auth;
pub mod error;
pub mod manifest;
pub mod registry;

pub use auth::BearerTokenAuthorizer;
pub use error::{OciError, Result};
pub use manifest::{Descriptor, ImageManifest, MediaKind};
pub use registry::RegistryClient;
