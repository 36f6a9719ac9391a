use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use clair_adapter::api;
use clair_adapter::config::Config;
use clair_adapter::harbor::ScanRequest;
use clair_adapter::ImageScanner;

/// Harbor scanner adapter for Clair v2
#[derive(Parser)]
#[command(name = "clair-adapter", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the scanner adapter API
    Serve {
        /// Address to listen on
        #[arg(long, env = "SCANNER_API_SERVER_ADDR", default_value = "0.0.0.0:8080")]
        listen: SocketAddr,

        #[command(flatten)]
        config: Config,
    },
    /// Scan one artifact described by a Harbor scan request JSON file
    Scan {
        /// Path to the scan request
        #[arg(long)]
        file: PathBuf,

        #[command(flatten)]
        config: Config,
    },
    /// Print the report for a previous scan
    Report {
        /// Scan id returned by `scan`
        #[arg(long)]
        id: String,

        /// Print Clair's untranslated result instead of the Harbor report
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        config: Config,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { listen, config } => {
            let scanner = scanner_from(&config)?;
            api::serve(listen, scanner).await?;
        }
        Command::Scan { file, config } => {
            let scanner = scanner_from(&config)?;
            let raw = std::fs::read_to_string(&file)?;
            let req: ScanRequest = serde_json::from_str(&raw)?;
            let resp = scanner.scan(&req).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Report { id, raw, config } => {
            let scanner = scanner_from(&config)?;
            let out = if raw {
                serde_json::to_string_pretty(&scanner.raw_report(&id).await?)?
            } else {
                serde_json::to_string_pretty(&scanner.get_report(&id).await?)?
            };
            println!("{}", out);
        }
    }

    Ok(())
}

fn scanner_from(config: &Config) -> Result<ImageScanner, Box<dyn std::error::Error>> {
    config.validate()?;
    tracing::info!(
        clair = %config.clair.url,
        clair_version = %config.clair.version,
        "starting scanner adapter",
    );
    Ok(ImageScanner::from_config(config)?)
}
