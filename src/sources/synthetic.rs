use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use super::{PriceSource, PriceTick, SourceError};

// Reference prices the jitter is applied around.
const BASE_PRICES: &[(&str, &str, Decimal)] = &[
    ("XLM", "USD", dec!(0.12)),
    ("XLM", "EUR", dec!(0.11)),
    ("XLM", "GBP", dec!(0.095)),
    ("XLM", "JPY", dec!(18.5)),
    ("BTC", "USD", dec!(43000)),
    ("BTC", "EUR", dec!(39500)),
    ("BTC", "GBP", dec!(34000)),
    ("BTC", "JPY", dec!(6200000)),
    ("ETH", "USD", dec!(2400)),
    ("ETH", "EUR", dec!(2200)),
    ("ETH", "GBP", dec!(1900)),
    ("ETH", "JPY", dec!(350000)),
    ("USDC", "USD", dec!(1.0)),
    ("USDC", "EUR", dec!(0.92)),
    ("USDC", "GBP", dec!(0.79)),
    ("USDC", "JPY", dec!(145)),
    ("KALE", "USD", dec!(0.05)),
    ("KALE", "EUR", dec!(0.046)),
    ("KALE", "GBP", dec!(0.04)),
    ("KALE", "JPY", dec!(7.25)),
];

// Units of each fiat currency per US dollar.
const FX_PER_USD: &[(&str, Decimal)] = &[
    ("USD", dec!(1.0)),
    ("EUR", dec!(0.92)),
    ("GBP", dec!(0.79)),
    ("JPY", dec!(145)),
    ("CAD", dec!(1.35)),
    ("AUD", dec!(1.55)),
    ("CHF", dec!(0.88)),
];

/// Offline oracle stand-in: fixed reference prices with random volatility.
/// Pairs outside the table are reported as `NotFound`.
pub struct SyntheticSource {
    jitter: bool,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self { jitter: true }
    }

    /// Reference prices without volatility.
    pub fn steady() -> Self {
        Self { jitter: false }
    }

    pub fn base_price(asset: &str, currency: &str) -> Option<Decimal> {
        BASE_PRICES
            .iter()
            .find(|(a, c, _)| a.eq_ignore_ascii_case(asset) && c.eq_ignore_ascii_case(currency))
            .map(|(_, _, p)| *p)
    }

    fn per_usd(currency: &str) -> Option<Decimal> {
        FX_PER_USD
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(currency))
            .map(|(_, rate)| *rate)
    }

    /// Cross rate between two fiat currencies: units of `currency` per `base`.
    pub fn fx_rate(base: &str, currency: &str) -> Option<Decimal> {
        let base_rate = Self::per_usd(base)?;
        let quote_rate = Self::per_usd(currency)?;
        quote_rate.checked_div(base_rate)
    }

    fn volatility(asset: &str) -> f64 {
        match asset.to_uppercase().as_str() {
            "BTC" => 0.03,
            "ETH" => 0.04,
            _ => 0.02,
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource {
    // Fiat pairs move at most 1% either way; a currency against itself is exactly 1.
    fn fx_tick(&self, base: &str, currency: &str, rate: Decimal) -> Result<PriceTick, SourceError> {
        if !self.jitter || base.eq_ignore_ascii_case(currency) {
            return Ok(PriceTick::new(rate));
        }

        let factor = 1.0 + rand::thread_rng().gen_range(-0.01..0.01);
        let factor = Decimal::from_f64(factor)
            .ok_or_else(|| SourceError::Parse(format!("bad jitter factor {}", factor)))?;
        Ok(PriceTick::new(rate * factor))
    }
}

#[async_trait]
impl PriceSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "Synthetic"
    }

    async fn fetch_price(&self, asset: &str, currency: &str) -> Result<PriceTick, SourceError> {
        if let Some(rate) = Self::fx_rate(asset, currency) {
            return self.fx_tick(asset, currency, rate);
        }

        let base = Self::base_price(asset, currency).ok_or(SourceError::NotFound)?;
        if !self.jitter {
            return Ok(PriceTick::new(base));
        }

        let (factor, change) = {
            let mut rng = rand::thread_rng();
            let v = Self::volatility(asset);
            (1.0 + rng.gen_range(-v..v), rng.gen_range(-5.0..5.0))
        };

        let factor = Decimal::from_f64(factor)
            .ok_or_else(|| SourceError::Parse(format!("bad jitter factor {}", factor)))?;
        let mut tick = PriceTick::new(base * factor);
        tick.change_24h = Decimal::from_f64(change).map(|c| c.round_dp(2));
        Ok(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jitter_stays_within_band() {
        let source = SyntheticSource::new();
        for _ in 0..50 {
            let tick = source.fetch_price("BTC", "USD").await.unwrap();
            assert!(tick.price >= dec!(41709) && tick.price <= dec!(44291), "{}", tick.price);
        }
    }

    #[tokio::test]
    async fn test_unknown_pair_is_not_found() {
        let source = SyntheticSource::new();
        let err = source.fetch_price("DOGE", "USD").await.unwrap_err();
        assert!(err.is_unsupported());
        let err = source.fetch_price("XLM", "CHF").await.unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn test_fx_cross_rates() {
        let steady = SyntheticSource::steady();
        assert_eq!(dec!(0.92), steady.fetch_price("USD", "EUR").await.unwrap().price);
        assert_eq!(dec!(145) / dec!(0.92), steady.fetch_price("EUR", "JPY").await.unwrap().price);

        let source = SyntheticSource::new();
        for _ in 0..50 {
            let cad = source.fetch_price("USD", "CAD").await.unwrap().price;
            assert!(cad >= dec!(1.3365) && cad <= dec!(1.3635), "{}", cad);
            assert_eq!(Decimal::ONE, source.fetch_price("GBP", "gbp").await.unwrap().price);
        }

        assert!(source.fetch_price("USD", "XLM").await.unwrap_err().is_unsupported());
    }

    #[tokio::test]
    async fn test_steady_returns_reference_price() {
        let tick = SyntheticSource::steady().fetch_price("xlm", "eur").await.unwrap();
        assert_eq!(dec!(0.11), tick.price);
        assert!(tick.change_24h.is_none());
    }
}
