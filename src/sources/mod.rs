pub mod fixed;
pub mod reflector;
pub mod synthetic;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

pub use fixed::StaticSource;
pub use reflector::ReflectorSource;
pub use synthetic::SyntheticSource;

/// One price reading as reported by an upstream feed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub change_24h: Option<Decimal>,
}

impl PriceTick {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            timestamp: Utc::now(),
            change_24h: None,
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_price(&self, asset: &str, currency: &str) -> Result<PriceTick, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimit,
    #[error("Not found")]
    NotFound,
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl SourceError {
    /// The feed has no data for the pair, as opposed to being unreachable.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SourceError::NotFound)
    }
}
