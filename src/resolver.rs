//! Capability resolver.
//!
//! Decides whether one direct request can return the image at its intrinsic
//! resolution, and tries the direct candidates in order:
//!
//! 1. `full/{width},` (exact intrinsic width)
//! 2. `full/max`
//! 3. `full/full`
//!
//! The first HTTP success is only a preliminary result. Its JPEG header is
//! read and the image is rejected when it is narrower than the descriptor
//! says, since some servers downsample `max` and `full` without saying so.
//! A rejection never moves on to the next direct candidate; it hands over to
//! the tile stitcher.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::AttemptLog;
use crate::fallback::FallbackChain;
use crate::info::ImageCapabilities;
use crate::io::ImageSource;
use crate::request::{ImageRequest, Size};
use crate::tile::JpegCodec;

/// A server cap that rules out a direct full-resolution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapLimit {
    MaxWidth { max: u32, width: u32 },
    MaxHeight { max: u32, height: u32 },
    MaxArea { max: u64, area: u64 },
}

impl fmt::Display for CapLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapLimit::MaxWidth { max, width } => write!(f, "maxWidth {} < width {}", max, width),
            CapLimit::MaxHeight { max, height } => {
                write!(f, "maxHeight {} < height {}", max, height)
            }
            CapLimit::MaxArea { max, area } => write!(f, "maxArea {} < area {}", max, area),
        }
    }
}

/// Result of inspecting the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectPlan {
    /// A cap is below intrinsic size; go straight to tiling
    Infeasible(CapLimit),

    /// Direct requests to try, in order
    Candidates(Vec<ImageRequest>),
}

/// Plan the direct tier for `caps`.
pub fn plan_direct(caps: &ImageCapabilities) -> DirectPlan {
    if let Some(max) = caps.max_width.filter(|&m| m < caps.width) {
        return DirectPlan::Infeasible(CapLimit::MaxWidth {
            max,
            width: caps.width,
        });
    }
    if let Some(max) = caps.max_height.filter(|&m| m < caps.height) {
        return DirectPlan::Infeasible(CapLimit::MaxHeight {
            max,
            height: caps.height,
        });
    }
    if let Some(max) = caps.max_area.filter(|&m| m < caps.area()) {
        return DirectPlan::Infeasible(CapLimit::MaxArea {
            max,
            area: caps.area(),
        });
    }

    DirectPlan::Candidates(vec![
        ImageRequest::full(Size::Width(caps.width)),
        ImageRequest::full(Size::Max),
        ImageRequest::full(Size::Full),
    ])
}

/// How the direct tier ended.
#[derive(Debug, Clone)]
pub enum DirectOutcome {
    /// A candidate returned the image at intrinsic width or wider
    Accepted {
        url: String,
        body: Bytes,
        width: u32,
        height: u32,
    },

    /// A cap ruled out direct fetching; nothing was requested
    Infeasible(CapLimit),

    /// Every candidate failed at the transport level
    Exhausted(AttemptLog),

    /// A candidate succeeded but returned fewer pixels than intrinsic
    Downsampled {
        url: String,
        actual_width: u32,
        intrinsic_width: u32,
    },

    /// A candidate succeeded but its body is not a readable JPEG
    Unreadable { url: String, message: String },
}

impl DirectOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DirectOutcome::Accepted { .. })
    }

    /// One-line description used in logs and terminal errors.
    pub fn summary(&self) -> String {
        match self {
            DirectOutcome::Accepted { url, width, .. } => {
                format!("accepted {} at width {}", url, width)
            }
            DirectOutcome::Infeasible(limit) => format!("skipped, {}", limit),
            DirectOutcome::Exhausted(attempts) => format!("all candidates failed: {}", attempts),
            DirectOutcome::Downsampled {
                url,
                actual_width,
                intrinsic_width,
            } => format!(
                "{} returned width {} < intrinsic {}",
                url, actual_width, intrinsic_width
            ),
            DirectOutcome::Unreadable { url, message } => {
                format!("{} returned an unreadable image: {}", url, message)
            }
        }
    }
}

/// Runs the direct tier against one service.
pub struct CapabilityResolver<'a, S: ImageSource + ?Sized> {
    source: &'a S,
    service_base: &'a str,
    codec: JpegCodec,
}

impl<'a, S: ImageSource + ?Sized> CapabilityResolver<'a, S> {
    pub fn new(source: &'a S, service_base: &'a str) -> Self {
        Self {
            source,
            service_base,
            codec: JpegCodec::new(),
        }
    }

    /// Try the direct candidates for `caps` and verify the result's width.
    pub async fn resolve(&self, caps: &ImageCapabilities) -> DirectOutcome {
        let candidates = match plan_direct(caps) {
            DirectPlan::Infeasible(limit) => {
                info!(limit = %limit, "Direct fetch capped by server");
                return DirectOutcome::Infeasible(limit);
            }
            DirectPlan::Candidates(candidates) => candidates,
        };

        let mut chain = FallbackChain::new(candidates);
        let mut preliminary = None;

        while let Some(request) = chain.current().copied() {
            let url = request.url(self.service_base);
            match self.source.get(&url).await {
                Ok(body) => {
                    chain.accept();
                    preliminary = Some((url, body));
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Direct candidate failed");
                    chain.reject(url, e.to_string());
                }
            }
        }

        let Some((url, body)) = preliminary else {
            let attempts = chain.into_attempts();
            warn!(attempts = %attempts, "All direct candidates failed");
            return DirectOutcome::Exhausted(attempts);
        };

        match self.codec.dimensions(&body) {
            Ok((width, height)) if width >= caps.width => {
                info!(url = %url, width, height, "Direct fetch accepted");
                DirectOutcome::Accepted {
                    url,
                    body,
                    width,
                    height,
                }
            }
            Ok((width, _)) => {
                warn!(
                    url = %url,
                    actual_width = width,
                    intrinsic_width = caps.width,
                    "Direct result is downsampled"
                );
                DirectOutcome::Downsampled {
                    url,
                    actual_width: width,
                    intrinsic_width: caps.width,
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Direct result is not a readable JPEG");
                DirectOutcome::Unreadable {
                    url,
                    message: e.to_string(),
                }
            }
        }
    }
}
