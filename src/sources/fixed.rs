use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use super::{PriceSource, PriceTick, SourceError};

/// Deterministic in-memory price table. Counts upstream calls and can be
/// switched into a failing or slow mode.
#[derive(Default)]
pub struct StaticSource {
    prices: RwLock<HashMap<(String, String), Decimal>>,
    delay: RwLock<Option<Duration>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, asset: &str, currency: &str, price: Decimal) -> Self {
        self.set_price(asset, currency, price);
        self
    }

    pub fn set_price(&self, asset: &str, currency: &str, price: Decimal) {
        self.prices
            .write()
            .insert((asset.to_uppercase(), currency.to_uppercase()), price);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of `fetch_price` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticSource {
    fn name(&self) -> &'static str {
        "Static"
    }

    async fn fetch_price(&self, asset: &str, currency: &str) -> Result<PriceTick, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Network("static source set to fail".to_string()));
        }

        let price = self
            .prices
            .read()
            .get(&(asset.to_uppercase(), currency.to_uppercase()))
            .copied()
            .ok_or(SourceError::NotFound)?;

        Ok(PriceTick::new(price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_source_lookup_and_failure() {
        let source = StaticSource::new().with_price("xlm", "usd", dec!(0.12));

        let tick = source.fetch_price("XLM", "USD").await.unwrap();
        assert_eq!(dec!(0.12), tick.price);

        let err = source.fetch_price("XLM", "ZZZ").await.unwrap_err();
        assert!(err.is_unsupported());

        source.set_failing(true);
        let err = source.fetch_price("XLM", "USD").await.unwrap_err();
        assert!(matches!(err, SourceError::Network(_)));
        assert_eq!(3, source.calls());
    }
}
