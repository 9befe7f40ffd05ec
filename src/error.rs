use thiserror::Error;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("upstream unavailable for {asset}/{currency}: {reason}")]
    UpstreamUnavailable {
        asset: String,
        currency: String,
        reason: String,
    },
}

impl PricingError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PricingError::InvalidArgument(msg.into())
    }

    /// Upstream failures are worth retrying, bad input is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PricingError::UpstreamUnavailable { .. })
    }
}
