use thiserror::Error;

/// Transport-level failures from a language model gateway.
///
/// These are distinct from a model that answers with nothing useful: every
/// variant means the call itself could not be completed. This enum is marked
/// `#[non_exhaustive]` so new classifications can be added later.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The provider throttled the request (HTTP 429 or a quota error).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider is temporarily unavailable (HTTP 5xx).
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The request never reached the provider.
    #[error("network: {0}")]
    Network(String),

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other error response from the provider.
    #[error("provider api: {0}")]
    Api(String),

    /// The provider response could not be decoded or was empty.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ModelError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Unavailable(_))
    }
}
