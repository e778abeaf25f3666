use std::fmt;

use thiserror::Error;

use crate::tile::TileRegion;

/// Errors from a single request to the image server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Any other failure while sending the request
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// The request URL could not be parsed
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Errors in the capability descriptor (`info.json`).
#[derive(Debug, Clone, Error)]
pub enum DescriptorError {
    /// Body is not valid JSON or has the wrong shape
    #[error("Invalid info.json: {0}")]
    Json(String),

    /// A required field is absent
    #[error("info.json is missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but unusable
    #[error("Invalid value for '{field}' in info.json: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Errors from decoding or encoding JPEG data.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Bytes could not be decoded as an image
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Canvas could not be encoded as JPEG
    #[error("Failed to encode JPEG: {message}")]
    Encode { message: String },
}

/// One rejected candidate in a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// URL that was requested
    pub url: String,

    /// Why the candidate was rejected
    pub reason: String,
}

/// Ordered record of every rejected candidate in a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptLog(pub Vec<Attempt>);

impl AttemptLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, url: impl Into<String>, reason: impl Into<String>) {
        self.0.push(Attempt {
            url: url.into(),
            reason: reason.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.url.as_str())
    }
}

impl fmt::Display for AttemptLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no candidates tried");
        }
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} ({})", attempt.url, attempt.reason)?;
        }
        Ok(())
    }
}

/// Errors that abort a tile stitch.
#[derive(Debug, Clone, Error)]
pub enum StitchError {
    /// Every request variant for one region failed
    #[error("All requests failed for tile {region}: {attempts}")]
    TileExhausted {
        region: TileRegion,
        attempts: AttemptLog,
    },

    /// The canvas for this image would exceed the allocation limit
    #[error("Canvas {width}x{height} exceeds the {limit}-byte limit")]
    CanvasTooLarge { width: u32, height: u32, limit: u64 },

    /// The finished canvas could not be encoded
    #[error("{0}")]
    Encode(#[from] CodecError),

    /// The encoded image could not be written
    #[error("Failed to write {path}: {message}")]
    Output { path: String, message: String },
}

/// Terminal errors surfaced by the downloader.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// `info.json` could not be retrieved
    #[error("Failed to fetch capability descriptor: {0}")]
    DescriptorFetch(TransportError),

    /// `info.json` was retrieved but is unusable
    #[error("{0}")]
    Descriptor(#[from] DescriptorError),

    /// Direct fetch was not usable and tiling failed too
    #[error("Direct fetch not usable ({direct}); stitching failed: {source}")]
    Stitch {
        direct: String,
        #[source]
        source: StitchError,
    },

    /// The accepted direct image could not be written
    #[error("Failed to write {path}: {message}")]
    Output { path: String, message: String },
}
