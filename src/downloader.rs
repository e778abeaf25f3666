//! Page downloader: resolver first, stitcher as the fallback of last resort.
//!
//! ```text
//!  info.json ──▶ CapabilityResolver ──Accepted──▶ write bytes verbatim
//!                      │
//!                      │ Infeasible / Exhausted / Downsampled / Unreadable
//!                      ▼
//!                TileStitcher ──▶ encode canvas ──▶ write JPEG
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::DownloadError;
use crate::info::{fetch_capabilities, ImageCapabilities};
use crate::io::ImageSource;
use crate::resolver::{CapabilityResolver, DirectOutcome};
use crate::tile::{TileGrid, TileStitcher, DEFAULT_TILE_SIZE};

/// Knobs for one downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Tile size used when `info.json` declares none
    pub default_tile_size: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            default_tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

/// How the final image was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadMethod {
    /// One direct request, saved verbatim
    Direct { url: String },

    /// Rebuilt from tiles
    Stitched {
        tiles: usize,
        tile_size: u32,
        /// Why the direct tier was not used
        direct: String,
    },
}

/// Summary of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub method: DownloadMethod,
    pub width: u32,
    pub height: u32,
}

/// Downloads one page image at its intrinsic resolution.
///
/// Holds no per-download state: every call allocates its own canvas, so one
/// downloader can serve concurrent calls as long as their output paths differ.
pub struct PageDownloader<S: ImageSource> {
    source: S,
    options: DownloadOptions,
}

impl<S: ImageSource> PageDownloader<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, DownloadOptions::default())
    }

    pub fn with_options(source: S, options: DownloadOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> DownloadOptions {
        self.options
    }

    /// Fetch `{service_base}/info.json`, then download the image to `output`.
    pub async fn download(
        &self,
        service_base: &str,
        output: &Path,
    ) -> Result<DownloadReport, DownloadError> {
        let service_base = service_base.trim_end_matches('/');
        let caps = fetch_capabilities(&self.source, service_base).await?;
        info!(
            service = service_base,
            width = caps.width,
            height = caps.height,
            "Intrinsic size"
        );
        self.download_with_capabilities(service_base, &caps, output)
            .await
    }

    /// Download using already-fetched capabilities.
    pub async fn download_with_capabilities(
        &self,
        service_base: &str,
        caps: &ImageCapabilities,
        output: &Path,
    ) -> Result<DownloadReport, DownloadError> {
        let service_base = service_base.trim_end_matches('/');

        let outcome = CapabilityResolver::new(&self.source, service_base)
            .resolve(caps)
            .await;

        if let DirectOutcome::Accepted {
            url,
            body,
            width,
            height,
        } = outcome
        {
            tokio::fs::write(output, &body)
                .await
                .map_err(|e| DownloadError::Output {
                    path: output.display().to_string(),
                    message: e.to_string(),
                })?;
            info!(path = %output.display(), url = %url, "Saved direct image");
            return Ok(DownloadReport {
                path: output.to_path_buf(),
                method: DownloadMethod::Direct { url },
                width,
                height,
            });
        }

        let direct = outcome.summary();
        warn!(reason = %direct, "Falling back to tile stitching");

        let tile_size = caps.tile_size_or(self.options.default_tile_size);
        let grid = TileGrid::new(caps.width, caps.height, tile_size);

        TileStitcher::new(&self.source, service_base)
            .stitch_to_file(&grid, output)
            .await
            .map_err(|source| DownloadError::Stitch {
                direct: direct.clone(),
                source,
            })?;

        Ok(DownloadReport {
            path: output.to_path_buf(),
            method: DownloadMethod::Stitched {
                tiles: grid.len(),
                tile_size: grid.tile_size(),
                direct,
            },
            width: caps.width,
            height: caps.height,
        })
    }
}
