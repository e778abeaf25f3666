mod http_source;
mod image_source;

pub use http_source::{
    HttpImageSource, TransportConfig, TrustPolicy, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
pub use image_source::{join_url, ImageSource};
