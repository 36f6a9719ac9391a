//! clair-adapter: Harbor pluggable-scanner adapter for Clair v2
//!
//! Harbor asks the adapter to scan an image by digest; the adapter resolves
//! the image manifest from the registry, registers each filesystem layer with
//! Clair as a parent-linked chain, and hands back the top layer's name as the
//! scan id. Reports are produced on demand by fetching that layer from Clair
//! and translating its features and vulnerabilities into Harbor's format.
//!
//! # Example
//!
//! ```no_run
//! use clair_adapter::{config::Config, harbor::ScanRequest, scanner::ImageScanner};
//!
//! # async fn demo(req: ScanRequest) -> clair_adapter::Result<()> {
//! let scanner = ImageScanner::from_config(&Config::default())?;
//!
//! let scan = scanner.scan(&req).await?;
//! let report = scanner.get_report(&scan.id).await?;
//! println!("{}: {} vulnerabilities", report.severity, report.vulnerabilities.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chain;
pub mod clair;
pub mod config;
pub mod error;
pub mod harbor;
pub mod scanner;
pub mod translate;

pub use error::{Error, ErrorKind, Result};
pub use scanner::ImageScanner;
