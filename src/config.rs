//! Configuration for the `iiif-fetch` binary.
//!
//! Options come from command-line arguments via clap, each with an `IIIF_`
//! environment variable fallback:
//!
//! - `IIIF_OUTPUT` - Output JPEG path (default: page.jpg)
//! - `IIIF_TIMEOUT` - Per-request timeout in seconds (default: 30)
//! - `IIIF_USER_AGENT` - User-Agent header
//! - `IIIF_DEFAULT_TILE_SIZE` - Tile size when info.json declares none (default: 512)
//! - `IIIF_INSECURE_HOSTS` - Comma-separated hosts for which TLS verification is skipped
//!
//! The library never reads these variables itself; [`Config`] converts them
//! into an explicit [`TransportConfig`] and [`DownloadOptions`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::downloader::DownloadOptions;
use crate::io::{TransportConfig, TrustPolicy, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::tile::DEFAULT_TILE_SIZE;

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "page.jpg";

/// Upper bound for the per-request timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound for the default tile size.
pub const MAX_TILE_SIZE: u32 = 8192;

/// iiif-fetch - Download a IIIF page image at full resolution.
///
/// Requests the image directly when the server allows it, and rebuilds it
/// from tiles when the server caps or downsamples direct requests.
#[derive(Parser, Debug, Clone)]
#[command(name = "iiif-fetch")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Image service base URL (the part before /info.json).
    pub service_base: String,

    /// Output JPEG path.
    #[arg(short, long, default_value = DEFAULT_OUTPUT, env = "IIIF_OUTPUT")]
    pub output: PathBuf,

    /// Timeout for each request, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "IIIF_TIMEOUT")]
    pub timeout: u64,

    /// User-Agent header sent with every request.
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "IIIF_USER_AGENT")]
    pub user_agent: String,

    /// Tile size to use when info.json declares none.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "IIIF_DEFAULT_TILE_SIZE")]
    pub default_tile_size: u32,

    /// Skip TLS certificate verification for this host and its subdomains.
    ///
    /// May be repeated. WARNING: only use for servers with known broken certificates.
    #[arg(long = "insecure-host", env = "IIIF_INSECURE_HOSTS", value_delimiter = ',')]
    pub insecure_hosts: Vec<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let base = self.service_base.trim();
        if base.is_empty() {
            return Err("Service base URL is required".to_string());
        }
        match url::Url::parse(base) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(format!(
                    "Service base must be an http(s) URL, got scheme '{}'",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("Invalid service base URL '{}': {}", base, e)),
        }

        if self.timeout == 0 || self.timeout > MAX_TIMEOUT_SECS {
            return Err(format!(
                "timeout must be between 1 and {} seconds",
                MAX_TIMEOUT_SECS
            ));
        }

        if self.default_tile_size == 0 || self.default_tile_size > MAX_TILE_SIZE {
            return Err(format!(
                "default_tile_size must be between 1 and {}",
                MAX_TILE_SIZE
            ));
        }

        if self.insecure_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err("insecure-host entries must not be empty".to_string());
        }

        Ok(())
    }

    /// Service base with surrounding whitespace and trailing `/` removed.
    pub fn service_base(&self) -> &str {
        self.service_base.trim().trim_end_matches('/')
    }

    /// Trust policy derived from `--insecure-host`.
    pub fn trust_policy(&self) -> TrustPolicy {
        if self.insecure_hosts.is_empty() {
            TrustPolicy::VerifyAll
        } else {
            TrustPolicy::SkipVerificationFor(
                self.insecure_hosts
                    .iter()
                    .map(|h| h.trim().to_string())
                    .collect(),
            )
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_user_agent(self.user_agent.clone())
            .with_trust(self.trust_policy())
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            default_tile_size: self.default_tile_size,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
