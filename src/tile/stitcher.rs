//! Tile stitcher.
//!
//! Rebuilds a full-resolution image from its tiles when a direct request
//! cannot deliver it:
//!
//! ```text
//! ┌──────────────┐   regions    ┌──────────────────────────┐   RgbImage   ┌──────────┐
//! │   TileGrid   │ ───────────▶ │ fetch_tile (per region)  │ ───────────▶ │  Canvas  │
//! └──────────────┘  row-major   │  {w}, → pct:100 → full   │  exact size  └────┬─────┘
//!                               └──────────────────────────┘                   │ encode
//!                                                                              ▼
//!                                                                         output path
//! ```
//!
//! Tiles are fetched one at a time in grid order. The canvas is only encoded
//! and written once every region has been composited, so a failed tile never
//! leaves a partial image at the output path.

use std::path::Path;

use image::{imageops, RgbImage};
use tracing::{debug, info, warn};

use super::encoder::JpegCodec;
use super::grid::{TileGrid, TileRegion};
use crate::error::StitchError;
use crate::fallback::FallbackChain;
use crate::io::ImageSource;
use crate::request::{ImageRequest, Size};

/// Largest RGB canvas the stitcher will allocate, in bytes.
pub const MAX_CANVAS_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Byte size of an RGB canvas for `grid`, or `CanvasTooLarge` when it
/// overflows or exceeds [`MAX_CANVAS_BYTES`].
pub fn canvas_bytes(grid: &TileGrid) -> Result<usize, StitchError> {
    let too_large = || StitchError::CanvasTooLarge {
        width: grid.width(),
        height: grid.height(),
        limit: MAX_CANVAS_BYTES,
    };

    let bytes = (grid.width() as u64)
        .checked_mul(grid.height() as u64)
        .and_then(|pixels| pixels.checked_mul(3))
        .filter(|&bytes| bytes <= MAX_CANVAS_BYTES)
        .ok_or_else(too_large)?;
    usize::try_from(bytes).map_err(|_| too_large())
}

/// Request variants for one region, most specific first.
pub fn tile_variants(region: TileRegion) -> Vec<ImageRequest> {
    vec![
        ImageRequest::tile(region, Size::Width(region.width)),
        ImageRequest::tile(region, Size::Percent100),
        ImageRequest::tile(region, Size::Full),
    ]
}

/// Fetches every tile of one image and composites them into a canvas.
pub struct TileStitcher<'a, S: ImageSource + ?Sized> {
    source: &'a S,
    service_base: &'a str,
    codec: JpegCodec,
}

impl<'a, S: ImageSource + ?Sized> TileStitcher<'a, S> {
    pub fn new(source: &'a S, service_base: &'a str) -> Self {
        Self {
            source,
            service_base,
            codec: JpegCodec::new(),
        }
    }

    /// Fetch one region at exactly its declared size.
    ///
    /// A variant fails on a transport error or an undecodable body; the next
    /// variant is then tried. Returns [`StitchError::TileExhausted`] when all
    /// of them fail.
    pub async fn fetch_tile(&self, region: TileRegion) -> Result<RgbImage, StitchError> {
        let mut chain = FallbackChain::new(tile_variants(region));

        while let Some(request) = chain.current().copied() {
            let url = request.url(self.service_base);

            let body = match self.source.get(&url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!(url = %url, error = %e, "Tile request failed");
                    chain.reject(url, e.to_string());
                    continue;
                }
            };

            match self.codec.decode_rgb(&body) {
                Ok(tile) => {
                    chain.accept();
                    if tile.dimensions() != (region.width, region.height) {
                        warn!(
                            region = %region,
                            got_width = tile.width(),
                            got_height = tile.height(),
                            "Tile size mismatch, resampling to region size"
                        );
                    }
                    return Ok(self.codec.fit_exact(tile, region.width, region.height));
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Tile body not decodable");
                    chain.reject(url, e.to_string());
                }
            }
        }

        Err(StitchError::TileExhausted {
            region,
            attempts: chain.into_attempts(),
        })
    }

    /// Fetch every region of `grid` and composite them into a new canvas.
    pub async fn stitch(&self, grid: &TileGrid) -> Result<RgbImage, StitchError> {
        info!(
            width = grid.width(),
            height = grid.height(),
            tile_size = grid.tile_size(),
            cols = grid.cols(),
            rows = grid.rows(),
            "Stitching tiles"
        );

        let bytes = canvas_bytes(grid)?;
        debug!(bytes, "Allocating canvas");
        let mut canvas = RgbImage::new(grid.width(), grid.height());

        for (index, region) in grid.regions().enumerate() {
            let tile = self.fetch_tile(region).await?;
            imageops::replace(&mut canvas, &tile, region.x as i64, region.y as i64);
            debug!(
                tile = index + 1,
                total = grid.len(),
                region = %region,
                "Tile composited"
            );
        }

        Ok(canvas)
    }

    /// Stitch `grid` and write the result as JPEG to `output`.
    ///
    /// The output path is not touched unless every tile was fetched and the
    /// canvas encoded.
    pub async fn stitch_to_file(&self, grid: &TileGrid, output: &Path) -> Result<(), StitchError> {
        let canvas = self.stitch(grid).await?;
        let bytes = self.codec.encode(&canvas)?;

        tokio::fs::write(output, &bytes)
            .await
            .map_err(|e| StitchError::Output {
                path: output.display().to_string(),
                message: e.to_string(),
            })?;

        info!(path = %output.display(), bytes = bytes.len(), "Stitched image written");
        Ok(())
    }
}
