//! JPEG decoding, exact-size correction and canvas encoding.
//!
//! # Design Decisions
//!
//! - **Fixed output quality**: the stitched canvas is always encoded at
//!   [`STITCH_JPEG_QUALITY`]. There is no quality knob.
//!
//! - **Resizing is a guard**: tiles are requested at their exact size. A
//!   tile is only resampled when the server returns different dimensions.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;

use crate::error::CodecError;

/// JPEG quality used for stitched output.
pub const STITCH_JPEG_QUALITY: u8 = 95;

/// Stateless JPEG codec for tiles and canvases.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode JPEG bytes to an RGB image.
    pub fn decode_rgb(&self, source: &[u8]) -> Result<RgbImage, CodecError> {
        let reader = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg);
        let img = reader.decode().map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })?;
        Ok(img.to_rgb8())
    }

    /// Read `(width, height)` from the JPEG header without decoding pixels.
    pub fn dimensions(&self, source: &[u8]) -> Result<(u32, u32), CodecError> {
        let reader = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg);
        reader.into_dimensions().map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })
    }

    /// Return `tile` at exactly `width` x `height`, resampling with Lanczos3
    /// only when its size differs.
    pub fn fit_exact(&self, tile: RgbImage, width: u32, height: u32) -> RgbImage {
        if tile.dimensions() == (width, height) {
            return tile;
        }
        imageops::resize(&tile, width, height, FilterType::Lanczos3)
    }

    /// Encode a canvas at [`STITCH_JPEG_QUALITY`].
    pub fn encode(&self, canvas: &RgbImage) -> Result<Vec<u8>, CodecError> {
        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, STITCH_JPEG_QUALITY);
        encoder
            .encode_image(canvas)
            .map_err(|e| CodecError::Encode {
                message: e.to_string(),
            })?;
        Ok(output)
    }
}
