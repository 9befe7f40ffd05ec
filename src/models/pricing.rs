use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize, Serializer};

use super::QuoteView;

/// Fractional digits shown for an asset amount when no per-asset override exists.
pub const DEFAULT_ASSET_PRECISION: u32 = 7;

fn default_currency() -> String {
    "USD".to_string()
}

fn default_asset() -> String {
    "XLM".to_string()
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingRequest {
    pub base_price: Decimal,
    #[serde(default = "default_currency")]
    pub base_currency: String,
    #[serde(default = "default_asset")]
    pub target_asset: String,
    #[serde(default = "default_multiplier")]
    pub demand_multiplier: Decimal,
}

impl PricingRequest {
    pub fn new(base_price: Decimal, base_currency: &str, target_asset: &str) -> Self {
        Self {
            base_price,
            base_currency: base_currency.to_string(),
            target_asset: target_asset.to_string(),
            demand_multiplier: Decimal::ONE,
        }
    }

    pub fn with_demand(mut self, demand_multiplier: Decimal) -> Self {
        self.demand_multiplier = demand_multiplier;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingResult {
    pub base_price: Decimal,
    pub base_currency: String,
    pub target_asset: String,
    pub asset_amount: Decimal,
    pub asset_price: Decimal,
    pub demand_multiplier: Decimal,
    pub demand_level: DemandLevel,
    pub quote_timestamp: DateTime<Utc>,
    pub precision: u32,
}

impl PricingResult {
    /// Amount rounded to the asset's display precision. `asset_amount` keeps
    /// full precision.
    pub fn rounded_amount(&self) -> Decimal {
        self.asset_amount
            .round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn formatted_amount(&self) -> String {
        let shown = self
            .asset_amount
            .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.4} {}", shown, self.target_asset)
    }
}

/// Discrete surge band for a demand multiplier. Each band includes its lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl DemandLevel {
    pub fn from_multiplier(multiplier: Decimal) -> Self {
        if multiplier >= dec!(2.0) {
            DemandLevel::VeryHigh
        } else if multiplier >= dec!(1.5) {
            DemandLevel::High
        } else if multiplier >= dec!(1.2) {
            DemandLevel::Moderate
        } else {
            DemandLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DemandLevel::VeryHigh => "Very High",
            DemandLevel::High => "High",
            DemandLevel::Moderate => "Moderate",
            DemandLevel::Low => "Low",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DemandLevel::VeryHigh => "Peak demand - prices significantly increased",
            DemandLevel::High => "High demand - surge pricing active",
            DemandLevel::Moderate => "Moderate demand - slight price increase",
            DemandLevel::Low => "Normal pricing",
        }
    }
}

impl std::fmt::Display for DemandLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DemandLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedAmount {
    pub amount: Decimal,
    pub rate: Decimal,
}

/// One currency of an expansion. `value` is `None` when no quote could be
/// produced for that currency.
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyEntry {
    pub currency: String,
    pub value: Option<ConvertedAmount>,
}

impl CurrencyEntry {
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyExpansion {
    pub asset_amount: Decimal,
    pub source_asset: String,
    pub entries: Vec<CurrencyEntry>,
}

impl CurrencyExpansion {
    pub fn get(&self, currency: &str) -> Option<&CurrencyEntry> {
        self.entries
            .iter()
            .find(|e| e.currency.eq_ignore_ascii_case(currency))
    }

    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_missing())
            .map(|e| e.currency.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyPrice {
    pub currency: String,
    pub quote: Option<QuoteView>,
}

/// All requested currencies for one asset.
#[derive(Debug, Clone, Serialize)]
pub struct AssetPrices {
    pub asset: String,
    pub prices: Vec<CurrencyPrice>,
}

/// Broadcast by the refresher after each cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PriceBoardUpdate {
    pub boards: Vec<AssetPrices>,
    pub timestamp: DateTime<Utc>,
}
