use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;

/// Cache key: `(asset, currency)`, both upper-cased.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QuoteKey {
    pub asset: String,
    pub currency: String,
}

impl QuoteKey {
    pub fn new(asset: &str, currency: &str) -> Self {
        Self {
            asset: asset.trim().to_uppercase(),
            currency: currency.trim().to_uppercase(),
        }
    }
}

impl std::fmt::Display for QuoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.asset, self.currency)
    }
}

/// A price snapshot for one asset in one currency. Never mutated after
/// creation; a refresh stores a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub asset: String,
    pub currency: String,
    pub price: Decimal,
    pub change_24h: Option<Decimal>,
    pub source: &'static str,
    pub source_timestamp: DateTime<Utc>,
    pub fetched_at: Instant,
}

impl Quote {
    pub fn key(&self) -> QuoteKey {
        QuoteKey::new(&self.asset, &self.currency)
    }

    pub fn view(&self) -> QuoteView {
        QuoteView {
            asset: self.asset.clone(),
            currency: self.currency.clone(),
            price: self.price,
            change_24h: self.change_24h,
            source: self.source.to_string(),
            timestamp: self.source_timestamp,
            age_ms: self.fetched_at.elapsed().as_millis() as u64,
        }
    }
}

/// Serializable form of a [`Quote`].
#[derive(Debug, Clone, Serialize)]
pub struct QuoteView {
    pub asset: String,
    pub currency: String,
    pub price: Decimal,
    pub change_24h: Option<Decimal>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub age_ms: u64,
}
