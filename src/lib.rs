//! Cached oracle quotes and demand-aware pricing for event tickets.
//!
//! [`services::QuoteCache`] keeps one quote per `(asset, currency)` and falls back
//! to the last good quote when the upstream feed fails.
//! [`services::PricingCalculator`] turns a fiat base price into an asset amount.

pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod services;
pub mod sources;

pub use error::PricingError;
