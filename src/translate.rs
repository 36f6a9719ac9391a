//! Clair result → Harbor report translation.

use crate::clair::{severity, ClairFeature, ClairLayerEnvelope};
use crate::harbor::{Severity, VulnerabilityItem, VulnerabilityReport};

/// Map a Clair severity label onto Harbor's scale. Matching is
/// case-insensitive and anything unrecognised becomes `Unknown`.
///
/// Lossy: Clair's `Critical` and `High` both land on `High`, because
/// Harbor's scale tops out there. The original label survives in the raw
/// report only.
pub fn map_severity(label: &str) -> Severity {
    match label.to_ascii_lowercase().as_str() {
        severity::NONE => Severity::None,
        severity::LOW => Severity::Low,
        severity::MEDIUM => Severity::Medium,
        severity::HIGH | severity::CRITICAL => Severity::High,
        _ => Severity::Unknown,
    }
}

/// Highest mapped severity among one feature's vulnerabilities, or `None`
/// when it has none.
fn feature_severity(feature: &ClairFeature) -> Severity {
    feature
        .vulnerabilities()
        .iter()
        .map(|v| map_severity(&v.severity))
        .max()
        .unwrap_or(Severity::None)
}

/// Aggregate severity of a layer result: the maximum over all features of
/// each feature's own maximum.
pub fn overview(result: &ClairLayerEnvelope) -> Severity {
    result
        .features()
        .iter()
        .map(feature_severity)
        .max()
        .unwrap_or(Severity::None)
}

/// Flatten every (feature, vulnerability) pair into a report item, keeping
/// Clair's ordering.
pub fn items(result: &ClairLayerEnvelope) -> Vec<VulnerabilityItem> {
    result
        .features()
        .iter()
        .flat_map(|f| {
            f.vulnerabilities().iter().map(move |v| VulnerabilityItem {
                id: v.name.clone(),
                package: f.name.clone(),
                version: f.version.clone(),
                fix_version: v.fixed_by.clone(),
                severity: map_severity(&v.severity),
                description: v.description.clone(),
                links: if v.link.is_empty() {
                    Vec::new()
                } else {
                    vec![v.link.clone()]
                },
            })
        })
        .collect()
}

/// Build the Harbor report for a Clair layer result.
pub fn translate(result: &ClairLayerEnvelope) -> VulnerabilityReport {
    VulnerabilityReport {
        generated_at: humantime::format_rfc3339_seconds(std::time::SystemTime::now()).to_string(),
        scanner: None,
        severity: overview(result),
        vulnerabilities: items(result),
    }
}
