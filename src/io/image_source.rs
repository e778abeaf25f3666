use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Trait for fetching resources from a IIIF image server.
///
/// The resolver and stitcher only ever issue plain GET requests, so this is
/// the whole transport surface. Implementations must be thread-safe; tests
/// substitute an in-memory server.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// GET `url` and return the full response body.
    ///
    /// Any non-success status must be reported as [`TransportError::Status`].
    async fn get(&self, url: &str) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T: ImageSource + ?Sized> ImageSource for std::sync::Arc<T> {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        (**self).get(url).await
    }
}

/// Join a service base and a relative path with exactly one `/`.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
