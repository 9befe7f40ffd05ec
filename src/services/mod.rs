pub mod cache;
pub mod calculator;
pub mod refresher;

pub use cache::{QuoteCache, FRESHNESS_WINDOW};
pub use calculator::{PricingCalculator, MARKET_ASSETS, VOLATILITY_BUFFER};
pub use refresher::{QuoteRefresher, Subscription, UpdateFeed};
