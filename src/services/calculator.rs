use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use crate::error::PricingError;
use crate::models::{
    AssetPrices, ConvertedAmount, CurrencyEntry, CurrencyExpansion, CurrencyPrice, DemandLevel,
    FxRate, FxRates, MarketPrice, MarketSummary, PricingRequest, PricingResult,
    DEFAULT_ASSET_PRECISION,
};
use super::QuoteCache;

/// Markup applied on top of every computed asset amount.
pub const VOLATILITY_BUFFER: Decimal = dec!(1.05);

/// Assets shown in the market summary.
pub const MARKET_ASSETS: [&str; 3] = ["XLM", "BTC", "ETH"];

pub struct PricingCalculator {
    cache: Arc<QuoteCache>,
    precision: HashMap<String, u32>,
}

impl PricingCalculator {
    pub fn new(cache: Arc<QuoteCache>) -> Self {
        Self {
            cache,
            precision: HashMap::new(),
        }
    }

    /// Per-asset display precision, keyed by ticker.
    pub fn with_precision(mut self, precision: HashMap<String, u32>) -> Self {
        self.precision = precision
            .into_iter()
            .map(|(asset, digits)| (asset.to_uppercase(), digits))
            .collect();
        self
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn precision_for(&self, asset: &str) -> u32 {
        self.precision
            .get(&asset.to_uppercase())
            .copied()
            .unwrap_or(DEFAULT_ASSET_PRECISION)
    }

    /// Asset amount covering `base_price` at the current quote, scaled by demand
    /// and the volatility buffer.
    pub async fn compute_asset_amount(&self, req: &PricingRequest) -> Result<PricingResult, PricingError> {
        if req.base_price <= Decimal::ZERO {
            return Err(PricingError::invalid(format!(
                "base price must be positive, got {}",
                req.base_price
            )));
        }
        if req.demand_multiplier < Decimal::ZERO {
            return Err(PricingError::invalid(format!(
                "demand multiplier must not be negative, got {}",
                req.demand_multiplier
            )));
        }

        let quote = self.cache.get_quote(&req.target_asset, &req.base_currency).await?;
        if quote.price <= Decimal::ZERO {
            return Err(PricingError::invalid(format!(
                "quote for {}/{} is not positive",
                quote.asset, quote.currency
            )));
        }

        let asset_amount = req
            .base_price
            .checked_div(quote.price)
            .and_then(|raw| raw.checked_mul(req.demand_multiplier))
            .and_then(|surged| surged.checked_mul(VOLATILITY_BUFFER))
            .ok_or_else(|| {
                PricingError::invalid(format!(
                    "amount out of range for {} {} at {}",
                    req.base_price, quote.currency, quote.price
                ))
            })?;

        tracing::debug!(
            "{} {} -> {} {} (rate {}, demand x{})",
            req.base_price, quote.currency, asset_amount, quote.asset, quote.price, req.demand_multiplier
        );

        Ok(PricingResult {
            base_price: req.base_price,
            base_currency: quote.currency.clone(),
            target_asset: quote.asset.clone(),
            asset_amount,
            asset_price: quote.price,
            demand_multiplier: req.demand_multiplier,
            demand_level: DemandLevel::from_multiplier(req.demand_multiplier),
            quote_timestamp: quote.source_timestamp,
            precision: self.precision_for(&quote.asset),
        })
    }

    /// Values `asset_amount` of `source_asset` in each currency. A currency that
    /// cannot be quoted is reported as missing; the others are unaffected.
    pub async fn expand_to_currencies<S: AsRef<str>>(
        &self,
        asset_amount: Decimal,
        source_asset: &str,
        currencies: &[S],
    ) -> Result<CurrencyExpansion, PricingError> {
        if asset_amount < Decimal::ZERO {
            return Err(PricingError::invalid(format!(
                "asset amount must not be negative, got {}",
                asset_amount
            )));
        }
        if source_asset.trim().is_empty() {
            return Err(PricingError::invalid("source asset must not be empty"));
        }

        let lookups = currencies.iter().map(|currency| {
            let currency = currency.as_ref();
            async move {
                let value = match self.cache.get_quote(source_asset, currency).await {
                    Ok(quote) => match asset_amount.checked_mul(quote.price) {
                        Some(amount) => Some(ConvertedAmount {
                            amount,
                            rate: quote.price,
                        }),
                        None => {
                            tracing::warn!(
                                "{} {} in {} is out of range",
                                asset_amount, source_asset, currency
                            );
                            None
                        }
                    },
                    Err(e) => {
                        tracing::warn!("No {} rate for {}: {}", currency, source_asset, e);
                        None
                    }
                };
                CurrencyEntry {
                    currency: currency.trim().to_uppercase(),
                    value,
                }
            }
        });

        Ok(CurrencyExpansion {
            asset_amount,
            source_asset: source_asset.trim().to_uppercase(),
            entries: join_all(lookups).await,
        })
    }

    /// Quote board for every asset in every currency, failures isolated per cell.
    pub async fn asset_prices<A: AsRef<str>, C: AsRef<str>>(
        &self,
        assets: &[A],
        currencies: &[C],
    ) -> Vec<AssetPrices> {
        let boards = assets.iter().map(|asset| {
            let asset = asset.as_ref();
            async move {
                let cells = currencies.iter().map(|currency| {
                    let currency = currency.as_ref();
                    async move {
                        let quote = match self.cache.get_quote(asset, currency).await {
                            Ok(quote) => Some(quote.view()),
                            Err(e) => {
                                tracing::debug!("No {} price for {}: {}", currency, asset, e);
                                None
                            }
                        };
                        CurrencyPrice {
                            currency: currency.trim().to_uppercase(),
                            quote,
                        }
                    }
                });
                AssetPrices {
                    asset: asset.trim().to_uppercase(),
                    prices: join_all(cells).await,
                }
            }
        });

        join_all(boards).await
    }

    /// Units of each currency per one unit of `base`. Rates come through the
    /// quote cache keyed as `base/currency`; unquotable currencies are `None`.
    pub async fn fx_rates<S: AsRef<str>>(&self, base: &str, currencies: &[S]) -> Result<FxRates, PricingError> {
        let base = base.trim().to_uppercase();
        if base.is_empty() {
            return Err(PricingError::invalid("base currency must not be empty"));
        }

        let lookups = currencies.iter().map(|currency| {
            let currency = currency.as_ref().trim().to_uppercase();
            let base = base.as_str();
            async move {
                let rate = if currency == base {
                    Some(Decimal::ONE)
                } else {
                    match self.cache.get_quote(base, &currency).await {
                        Ok(quote) => Some(quote.price),
                        Err(e) => {
                            tracing::warn!("No FX rate {}/{}: {}", base, currency, e);
                            None
                        }
                    }
                };
                FxRate { currency, rate }
            }
        });
        let rates = join_all(lookups).await;

        Ok(FxRates { base, rates })
    }

    pub async fn market_summary(&self, currency: &str) -> Result<MarketSummary, PricingError> {
        let currency = currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(PricingError::invalid("currency must not be empty"));
        }

        let lookups = MARKET_ASSETS.iter().map(|asset| {
            let currency = currency.as_str();
            async move {
                match self.cache.get_quote(asset, currency).await {
                    Ok(quote) => MarketPrice {
                        asset: quote.asset.clone(),
                        price: Some(quote.price),
                        change_24h: quote.change_24h,
                    },
                    Err(e) => {
                        tracing::debug!("No {} market price for {}: {}", currency, asset, e);
                        MarketPrice {
                            asset: asset.to_string(),
                            price: None,
                            change_24h: None,
                        }
                    }
                }
            }
        });
        let prices = join_all(lookups).await;

        Ok(MarketSummary {
            currency,
            prices,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSource;

    fn setup() -> (Arc<StaticSource>, PricingCalculator) {
        let source = Arc::new(
            StaticSource::new()
                .with_price("XLM", "USD", dec!(0.10))
                .with_price("XLM", "EUR", dec!(0.09))
                .with_price("BTC", "USD", dec!(43000)),
        );
        let cache = Arc::new(QuoteCache::new(source.clone()));
        (source, PricingCalculator::new(cache))
    }

    #[tokio::test(start_paused = true)]
    async fn test_compute_asset_amount() {
        let (_, calc) = setup();

        let result = calc
            .compute_asset_amount(&PricingRequest::new(dec!(100), "USD", "XLM"))
            .await
            .unwrap();

        assert_eq!(dec!(1050), result.asset_amount);
        assert_eq!(dec!(0.10), result.asset_price);
        assert_eq!(DemandLevel::Low, result.demand_level);
        assert_eq!("1050.0000 XLM", result.formatted_amount());
        assert_eq!(7, result.precision);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compute_with_surge() {
        let (_, calc) = setup();

        let req = PricingRequest::new(dec!(100), "usd", "xlm").with_demand(dec!(2));
        let result = calc.compute_asset_amount(&req).await.unwrap();

        assert_eq!(dec!(2100), result.asset_amount);
        assert_eq!(DemandLevel::VeryHigh, result.demand_level);
        assert_eq!("XLM", result.target_asset);
        assert_eq!("USD", result.base_currency);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_precision_is_kept() {
        let (_, calc) = setup();
        let calc = calc.with_precision(HashMap::from([("xlm".to_string(), 2)]));

        let req = PricingRequest::new(dec!(1), "USD", "XLM").with_demand(dec!(1.3));
        let result = calc.compute_asset_amount(&req).await.unwrap();

        assert_eq!(dec!(13.65), result.asset_amount);
        assert_eq!(DemandLevel::Moderate, result.demand_level);

        let req = PricingRequest::new(dec!(10), "USD", "BTC");
        let result = calc.compute_asset_amount(&req).await.unwrap();
        assert_eq!(dec!(10) / dec!(43000) * VOLATILITY_BUFFER, result.asset_amount);
        assert_eq!(dec!(0.0002442), result.rounded_amount());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_arguments_do_not_touch_cache() {
        let (source, calc) = setup();

        let err = calc
            .compute_asset_amount(&PricingRequest::new(Decimal::ZERO, "USD", "XLM"))
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidArgument(_)));

        let req = PricingRequest::new(dec!(100), "USD", "XLM").with_demand(dec!(-0.1));
        let err = calc.compute_asset_amount(&req).await.unwrap_err();
        assert!(matches!(err, PricingError::InvalidArgument(_)));

        assert_eq!(0, source.calls());
        assert!(calc.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_failure_propagates() {
        let (source, calc) = setup();
        source.set_failing(true);

        let err = calc
            .compute_asset_amount(&PricingRequest::new(dec!(100), "USD", "XLM"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_to_currencies_isolates_failures() {
        let (_, calc) = setup();

        let expansion = calc
            .expand_to_currencies(dec!(10), "XLM", &["USD", "EUR", "ZZZ"])
            .await
            .unwrap();

        let currencies: Vec<&str> = expansion.entries.iter().map(|e| e.currency.as_str()).collect();
        assert_eq!(vec!["USD", "EUR", "ZZZ"], currencies);

        let usd = expansion.get("USD").unwrap().value.clone().unwrap();
        assert_eq!(dec!(1.0), usd.amount);
        assert_eq!(dec!(0.10), usd.rate);

        let eur = expansion.get("eur").unwrap().value.clone().unwrap();
        assert_eq!(dec!(0.9), eur.amount);

        assert!(expansion.get("ZZZ").unwrap().is_missing());
        assert_eq!(vec!["ZZZ"], expansion.missing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_rejects_negative_amount() {
        let (source, calc) = setup();

        let err = calc
            .expand_to_currencies(dec!(-1), "XLM", &["USD"])
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidArgument(_)));
        assert_eq!(0, source.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowing_amount_is_invalid_argument() {
        let (source, calc) = setup();
        source.set_price("XLM", "USD", dec!(0.0001));

        let err = calc
            .compute_asset_amount(&PricingRequest::new(Decimal::MAX, "USD", "XLM"))
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidArgument(_)));

        let req = PricingRequest::new(dec!(1), "USD", "XLM").with_demand(Decimal::MAX);
        let err = calc.compute_asset_amount(&req).await.unwrap_err();
        assert!(matches!(err, PricingError::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expansion_overflow_marks_currency_missing() {
        let (source, calc) = setup();
        source.set_price("BTC", "JPY", dec!(6200000));
        let huge = Decimal::from_i128_with_scale(10i128.pow(25), 0);

        let expansion = calc.expand_to_currencies(huge, "BTC", &["JPY"]).await.unwrap();
        assert_eq!(vec!["JPY"], expansion.missing());

        let expansion = calc
            .expand_to_currencies(dec!(2), "BTC", &["USD", "JPY"])
            .await
            .unwrap();
        assert!(expansion.missing().is_empty());
        assert_eq!(dec!(12400000), expansion.get("JPY").unwrap().value.as_ref().unwrap().amount);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fx_rates_are_cached_per_pair() {
        let (source, calc) = setup();
        source.set_price("USD", "EUR", dec!(0.92));
        source.set_price("USD", "JPY", dec!(145));

        let fx = calc.fx_rates("usd", &["USD", "EUR", "JPY", "XYZ"]).await.unwrap();
        assert_eq!("USD", fx.base);
        assert_eq!(Some(Decimal::ONE), fx.get("USD"));
        assert_eq!(Some(dec!(0.92)), fx.get("EUR"));
        assert_eq!(None, fx.get("XYZ"));
        assert_eq!(3, source.calls());

        calc.fx_rates("USD", &["EUR", "JPY"]).await.unwrap();
        assert_eq!(3, source.calls());
        assert!(calc.cache().peek("USD", "JPY").is_some());

        let err = calc.fx_rates(" ", &["EUR"]).await.unwrap_err();
        assert!(matches!(err, PricingError::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_market_summary() {
        let (_, calc) = setup();

        let summary = calc.market_summary("usd").await.unwrap();
        assert_eq!("USD", summary.currency);
        assert_eq!(3, summary.prices.len());
        assert_eq!(Some(dec!(0.10)), summary.get("XLM").unwrap().price);
        assert_eq!(Some(dec!(43000)), summary.get("BTC").unwrap().price);
        assert_eq!(None, summary.get("ETH").unwrap().price);

        assert!(calc.market_summary("").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_asset_prices_board() {
        let (_, calc) = setup();

        let boards = calc.asset_prices(&["XLM", "BTC"], &["USD", "EUR"]).await;

        assert_eq!(2, boards.len());
        assert_eq!("XLM", boards[0].asset);
        assert!(boards[0].prices.iter().all(|p| p.quote.is_some()));
        assert_eq!("BTC", boards[1].asset);
        assert!(boards[1].prices[0].quote.is_some());
        assert!(boards[1].prices[1].quote.is_none());
    }
}
