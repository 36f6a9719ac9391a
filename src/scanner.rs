//! The adapter facade: `scan` drives Clair through a layer chain, and
//! `get_report` turns Clair's answer into a Harbor report.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chain::{build_chain, ManifestResolver, RegistryManifestResolver};
use crate::clair::{ClairBackend, ClairClient, ClairLayer, ClairLayerEnvelope};
use crate::config::Config;
use crate::harbor::{self, ScanRequest, ScanResponse, ScannerMetadata, VulnerabilityReport};
use crate::translate;
use crate::{Error, Result};

/// Submit every layer of `chain` to Clair, base first, and return the name
/// of the top layer.
///
/// Clair links each layer to its already-registered parent, so submissions
/// are strictly sequential. The first failure aborts the rest; layers that
/// were already accepted stay in Clair and are reused by later scans.
pub async fn submit_chain(backend: &dyn ClairBackend, chain: &[ClairLayer]) -> Result<String> {
    let top = chain
        .last()
        .ok_or_else(|| Error::InvalidRequest("empty layer chain".into()))?;

    for layer in chain {
        debug!(layer = %layer.name, path = %layer.path, "scanning layer");
        if let Err(e) = backend.scan_layer(layer).await {
            warn!(layer = %layer.name, error = %e, "failed to scan layer");
            return Err(e);
        }
    }

    Ok(top.name.clone())
}

/// Clair-backed implementation of Harbor's scanner adapter operations.
///
/// Holds no per-scan state; concurrent calls share only the HTTP connection
/// pools inside the collaborators.
#[derive(Clone)]
pub struct ImageScanner {
    resolver: Arc<dyn ManifestResolver>,
    backend: Arc<dyn ClairBackend>,
    scanner: harbor::Scanner,
}

impl ImageScanner {
    pub fn new(
        resolver: Arc<dyn ManifestResolver>,
        backend: Arc<dyn ClairBackend>,
        scanner: harbor::Scanner,
    ) -> Self {
        Self {
            resolver,
            backend,
            scanner,
        }
    }

    /// Wire up the registry resolver and Clair client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = RegistryManifestResolver::new(
            config.registry.timeout(),
            config.registry.insecure,
        )?;
        let backend = ClairClient::new(&config.clair.url, config.clair.timeout())?;
        Ok(Self::new(
            Arc::new(resolver),
            Arc::new(backend),
            harbor::Scanner::clair(config.clair.version.clone()),
        ))
    }

    pub fn metadata(&self) -> ScannerMetadata {
        ScannerMetadata::new(self.scanner.clone())
    }

    /// Index the artifact in Clair and return the scan handle.
    pub async fn scan(&self, req: &ScanRequest) -> Result<ScanResponse> {
        req.validate()?;

        let chain = build_chain(self.resolver.as_ref(), req).await?;
        if chain.is_empty() {
            return Err(Error::NoScannableLayers {
                repository: req.artifact.repository.clone(),
                digest: req.artifact.digest.clone(),
            });
        }

        let id = submit_chain(self.backend.as_ref(), &chain).await?;
        info!(
            repository = %req.artifact.repository,
            digest = %req.artifact.digest,
            layers = chain.len(),
            scan_id = %id,
            "scan submitted",
        );
        Ok(ScanResponse { id })
    }

    /// Fetch Clair's result for `scan_id` and translate it.
    pub async fn get_report(&self, scan_id: &str) -> Result<VulnerabilityReport> {
        let result = self.raw_report(scan_id).await?;
        let mut report = translate::translate(&result);
        report.scanner = Some(self.scanner.clone());
        debug!(
            scan_id,
            severity = %report.severity,
            vulnerabilities = report.vulnerabilities.len(),
            "report translated",
        );
        Ok(report)
    }

    /// Clair's untranslated result for `scan_id`.
    pub async fn raw_report(&self, scan_id: &str) -> Result<ClairLayerEnvelope> {
        validate_scan_id(scan_id)?;
        self.backend.get_result(scan_id).await.inspect_err(|e| {
            if !matches!(e, Error::NotFound(_)) {
                warn!(scan_id, error = %e, "failed to get result from Clair");
            }
        })
    }
}

/// Scan handles are embedded in Clair URLs, so anything that could change the
/// path or query is rejected up front. Dot segments would be normalised away
/// and leave `/v1/layers`.
fn validate_scan_id(scan_id: &str) -> Result<()> {
    if scan_id.is_empty()
        || scan_id == "."
        || scan_id == ".."
        || scan_id
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
    {
        return Err(Error::InvalidRequest(format!("malformed scan id '{scan_id}'")));
    }
    Ok(())
}
