//! Capability descriptor (`info.json`) model.
//!
//! Only the fields that drive resolution selection and tiling are kept:
//! intrinsic size, the optional `maxWidth`/`maxHeight`/`maxArea` caps, and the
//! tile size hint from the first `tiles` entry. Everything else in the
//! document is ignored.

use serde::Deserialize;
use tracing::debug;

use crate::error::{DescriptorError, DownloadError};
use crate::io::{join_url, ImageSource};

/// Well-known suffix appended to a service base to reach its descriptor.
pub const INFO_JSON: &str = "info.json";

#[derive(Debug, Deserialize)]
struct RawInfo {
    width: Option<u64>,
    height: Option<u64>,
    #[serde(rename = "maxWidth")]
    max_width: Option<u64>,
    #[serde(rename = "maxHeight")]
    max_height: Option<u64>,
    #[serde(rename = "maxArea")]
    max_area: Option<u64>,
    tiles: Option<Vec<RawTile>>,
}

#[derive(Debug, Deserialize)]
struct RawTile {
    width: Option<u64>,
    height: Option<u64>,
}

/// What an image service declares about one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCapabilities {
    /// Intrinsic width in pixels
    pub width: u32,

    /// Intrinsic height in pixels
    pub height: u32,

    /// Largest width the server will return, if capped
    pub max_width: Option<u32>,

    /// Largest height the server will return, if capped
    pub max_height: Option<u32>,

    /// Largest pixel area the server will return, if capped
    pub max_area: Option<u64>,

    /// Square tile size declared by the server
    pub tile_size: Option<u32>,
}

impl ImageCapabilities {
    /// Capabilities of an uncapped image with no tile hint.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            max_width: None,
            max_height: None,
            max_area: None,
            tile_size: None,
        }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.max_height = Some(max_height);
        self
    }

    pub fn with_max_area(mut self, max_area: u64) -> Self {
        self.max_area = Some(max_area);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = Some(tile_size);
        self
    }

    /// Parse and validate an `info.json` body.
    ///
    /// Zero-valued caps and tile hints are treated as absent.
    pub fn from_json(body: &[u8]) -> Result<Self, DescriptorError> {
        let raw: RawInfo =
            serde_json::from_slice(body).map_err(|e| DescriptorError::Json(e.to_string()))?;

        let width = dimension("width", raw.width)?;
        let height = dimension("height", raw.height)?;

        let tile_size = match raw.tiles.as_deref().and_then(|t| t.first()) {
            Some(tile) => nonzero_u32(
                "tiles.width",
                tile.width.filter(|&w| w > 0).or(tile.height),
            )?,
            None => None,
        };

        Ok(Self {
            width,
            height,
            max_width: nonzero_u32("maxWidth", raw.max_width)?,
            max_height: nonzero_u32("maxHeight", raw.max_height)?,
            max_area: raw.max_area.filter(|&a| a > 0),
            tile_size,
        })
    }

    /// Intrinsic pixel area.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Declared tile size, or `default` when the server gives no hint.
    pub fn tile_size_or(&self, default: u32) -> u32 {
        match self.tile_size {
            Some(size) => size,
            None => {
                debug!(tile_size = default, "No tile size declared, using default");
                default
            }
        }
    }
}

fn dimension(field: &'static str, value: Option<u64>) -> Result<u32, DescriptorError> {
    let value = value.ok_or(DescriptorError::MissingField(field))?;
    if value == 0 {
        return Err(DescriptorError::InvalidField {
            field,
            message: "must be greater than 0".to_string(),
        });
    }
    u32::try_from(value).map_err(|_| DescriptorError::InvalidField {
        field,
        message: format!("{} does not fit in 32 bits", value),
    })
}

fn nonzero_u32(field: &'static str, value: Option<u64>) -> Result<Option<u32>, DescriptorError> {
    match value {
        None | Some(0) => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| DescriptorError::InvalidField {
                field,
                message: format!("{} does not fit in 32 bits", v),
            }),
    }
}

/// Fetch and parse `{base}/info.json`.
pub async fn fetch_capabilities<S: ImageSource + ?Sized>(
    source: &S,
    service_base: &str,
) -> Result<ImageCapabilities, DownloadError> {
    let url = join_url(service_base, INFO_JSON);
    let body = source
        .get(&url)
        .await
        .map_err(DownloadError::DescriptorFetch)?;

    let caps = ImageCapabilities::from_json(&body)?;
    debug!(
        url = %url,
        width = caps.width,
        height = caps.height,
        max_width = ?caps.max_width,
        max_height = ?caps.max_height,
        max_area = ?caps.max_area,
        tile_size = ?caps.tile_size,
        "Capability descriptor loaded"
    );
    Ok(caps)
}
