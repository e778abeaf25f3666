//! IIIF Image API request descriptors.
//!
//! A request is rendered as `{base}/{region}/{size}/{rotation}/{quality}.{format}`.
//! Rotation, quality and format never vary here, so only region and size are
//! modelled.

use std::fmt;

use crate::io::join_url;
use crate::tile::TileRegion;

/// Rotation segment, always unrotated.
pub const ROTATION: &str = "0";

/// Quality segment.
pub const QUALITY: &str = "default";

/// Format extension.
pub const FORMAT: &str = "jpg";

/// Region segment of an image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The whole image
    Full,

    /// An absolute pixel box
    Pixels(TileRegion),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Full => write!(f, "full"),
            Region::Pixels(r) => write!(f, "{},{},{},{}", r.x, r.y, r.width, r.height),
        }
    }
}

/// Size segment of an image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    /// `full`: the generic alias, which some servers silently downsample
    Full,

    /// `max`: the server's own maximum
    Max,

    /// `{w},`: exact width, height scaled proportionally
    Width(u32),

    /// `pct:100`
    Percent100,
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Full => write!(f, "full"),
            Size::Max => write!(f, "max"),
            Size::Width(w) => write!(f, "{},", w),
            Size::Percent100 => write!(f, "pct:100"),
        }
    }
}

/// One image request against a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRequest {
    pub region: Region,
    pub size: Size,
}

impl ImageRequest {
    pub fn new(region: Region, size: Size) -> Self {
        Self { region, size }
    }

    /// Whole image at the given size.
    pub fn full(size: Size) -> Self {
        Self::new(Region::Full, size)
    }

    /// One tile region at the given size.
    pub fn tile(region: TileRegion, size: Size) -> Self {
        Self::new(Region::Pixels(region), size)
    }

    /// Path relative to the service base.
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.region, self.size, ROTATION, QUALITY, FORMAT
        )
    }

    /// Absolute URL for this request against `service_base`.
    pub fn url(&self, service_base: &str) -> String {
        join_url(service_base, &self.path())
    }
}
