//! # iiif-fetch
//!
//! Downloads one page image from a IIIF Image API server at its intrinsic
//! resolution.
//!
//! Many servers cap or silently downsample requests for the whole image. This
//! library first tries a small ordered set of direct requests and checks the
//! width of what comes back; when the server declares caps below the
//! intrinsic size, every direct request fails, or the result is too small, it
//! rebuilds the image from exact-size tiles instead.
//!
//! ## Architecture
//!
//! - [`info`] - `info.json` capability descriptor
//! - [`request`] - IIIF region/size request descriptors and URLs
//! - [`fallback`] - ordered first-success-wins chains
//! - [`resolver`] - direct-fetch planning and width verification
//! - [`tile`] - tile grid, JPEG codec and stitcher
//! - [`downloader`] - resolver then stitcher, the library entry point
//! - [`io`] - transport trait and reqwest client with explicit TLS trust policy
//! - [`config`] - CLI and environment configuration for the binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use iiif_fetch::{HttpImageSource, PageDownloader, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpImageSource::new(TransportConfig::default())?;
//!     let downloader = PageDownloader::new(source);
//!
//!     let report = downloader
//!         .download("https://example.org/iiif/2/page1", Path::new("page1.jpg"))
//!         .await?;
//!     println!("{}x{} via {:?}", report.width, report.height, report.method);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod fallback;
pub mod info;
pub mod io;
pub mod request;
pub mod resolver;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{DownloadMethod, DownloadOptions, DownloadReport, PageDownloader};
pub use error::{
    Attempt, AttemptLog, CodecError, DescriptorError, DownloadError, StitchError, TransportError,
};
pub use fallback::{ChainState, FallbackChain};
pub use info::{fetch_capabilities, ImageCapabilities};
pub use io::{HttpImageSource, ImageSource, TransportConfig, TrustPolicy};
pub use request::{ImageRequest, Region, Size};
pub use resolver::{plan_direct, CapLimit, CapabilityResolver, DirectOutcome, DirectPlan};
pub use tile::{JpegCodec, TileGrid, TileRegion, TileStitcher, DEFAULT_TILE_SIZE};
