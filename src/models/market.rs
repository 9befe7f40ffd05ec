use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FxRate {
    pub currency: String,
    pub rate: Option<Decimal>,
}

/// Units of each currency per one unit of `base`.
#[derive(Debug, Clone, Serialize)]
pub struct FxRates {
    pub base: String,
    pub rates: Vec<FxRate>,
}

impl FxRates {
    pub fn get(&self, currency: &str) -> Option<Decimal> {
        self.rates
            .iter()
            .find(|r| r.currency.eq_ignore_ascii_case(currency))
            .and_then(|r| r.rate)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketPrice {
    pub asset: String,
    pub price: Option<Decimal>,
    pub change_24h: Option<Decimal>,
}

/// Headline prices for the dashboard ticker.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub currency: String,
    pub prices: Vec<MarketPrice>,
    pub timestamp: DateTime<Utc>,
}

impl MarketSummary {
    pub fn get(&self, asset: &str) -> Option<&MarketPrice> {
        self.prices.iter().find(|p| p.asset.eq_ignore_ascii_case(asset))
    }
}
