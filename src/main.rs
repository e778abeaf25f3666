//! iiif-fetch - Download a IIIF page image at full resolution.
//!
//! This binary parses configuration, builds the HTTP transport and runs one
//! download.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iiif_fetch::{Config, DownloadMethod, HttpImageSource, PageDownloader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let service_base = config.service_base();
    info!("Service: {}", service_base);
    info!("Output: {}", config.output.display());
    for host in &config.insecure_hosts {
        warn!("TLS verification DISABLED for {}", host);
    }

    let source = match HttpImageSource::new(config.transport()) {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let downloader = PageDownloader::with_options(source, config.download_options());

    match downloader.download(service_base, &config.output).await {
        Ok(report) => {
            match report.method {
                DownloadMethod::Direct { ref url } => {
                    info!("Saved direct: {} ({})", report.path.display(), url);
                }
                DownloadMethod::Stitched {
                    tiles, tile_size, ..
                } => {
                    info!(
                        "Saved stitched: {} ({} tiles of {}px)",
                        report.path.display(),
                        tiles,
                        tile_size
                    );
                }
            }
            info!("Size: {}x{}", report.width, report.height);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Download failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "iiif_fetch=debug"
    } else {
        "iiif_fetch=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
