use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, trace, warn};

use super::ImageSource;
use crate::error::TransportError;

/// Default timeout applied to every request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent. Some image servers reject requests without a browser-like agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

// =============================================================================
// Transport Configuration
// =============================================================================

/// TLS certificate trust policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Verify certificates for every host.
    #[default]
    VerifyAll,

    /// Skip verification for these hosts and their subdomains only.
    SkipVerificationFor(Vec<String>),
}

impl TrustPolicy {
    /// Whether requests to `host` should skip certificate verification.
    pub fn skips_verification(&self, host: &str) -> bool {
        match self {
            TrustPolicy::VerifyAll => false,
            TrustPolicy::SkipVerificationFor(hosts) => {
                let host = host.to_ascii_lowercase();
                hosts.iter().any(|allowed| {
                    let allowed = allowed.trim_start_matches('.').to_ascii_lowercase();
                    host == allowed || host.ends_with(&format!(".{}", allowed))
                })
            }
        }
    }
}

/// Settings for [`HttpImageSource`], passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for each individual request
    pub timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Certificate trust policy
    pub trust: TrustPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            trust: TrustPolicy::VerifyAll,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }
}

// =============================================================================
// HTTP Image Source
// =============================================================================

/// reqwest-backed implementation of [`ImageSource`].
///
/// Holds a verifying client and, only when the trust policy names hosts, a
/// second client that accepts invalid certificates. The client is chosen per
/// request from the URL host.
#[derive(Clone)]
pub struct HttpImageSource {
    verified: Client,
    unverified: Option<Client>,
    trust: TrustPolicy,
}

impl HttpImageSource {
    /// Build the HTTP clients described by `config`.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let verified = build_client(&config, false)?;
        let unverified = match config.trust {
            TrustPolicy::VerifyAll => None,
            TrustPolicy::SkipVerificationFor(_) => Some(build_client(&config, true)?),
        };

        Ok(Self {
            verified,
            unverified,
            trust: config.trust,
        })
    }

    fn client_for(&self, url: &str) -> Result<&Client, TransportError> {
        let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        match (&self.unverified, parsed.host_str()) {
            (Some(client), Some(host)) if self.trust.skips_verification(host) => {
                trace!(url = url, host = host, "Using client without certificate verification");
                Ok(client)
            }
            _ => Ok(&self.verified),
        }
    }
}

fn build_client(
    config: &TransportConfig,
    skip_verification: bool,
) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(skip_verification)
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        let client = self.client_for(url)?;

        trace!(url = url, "HTTP GET request starting");

        let response = match client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(if e.is_timeout() {
                    TransportError::Timeout(url.to_string())
                } else if e.is_connect() {
                    TransportError::Connection(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                });
            }
        };

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        trace!(url = url, bytes = body.len(), "HTTP response body read");
        Ok(body)
    }
}
