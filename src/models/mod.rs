pub mod market;
pub mod pricing;
pub mod quote;

pub use market::{FxRate, FxRates, MarketPrice, MarketSummary};
pub use pricing::{
    AssetPrices, ConvertedAmount, CurrencyEntry, CurrencyExpansion, CurrencyPrice, DemandLevel,
    PriceBoardUpdate, PricingRequest, PricingResult, DEFAULT_ASSET_PRECISION,
};
pub use quote::{Quote, QuoteKey, QuoteView};
