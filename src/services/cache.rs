use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use crate::error::PricingError;
use crate::models::{Quote, QuoteKey};
use crate::sources::{PriceSource, SourceError};

/// How long a fetched quote is served without asking upstream again.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

struct CacheEntry {
    quote: Arc<Quote>,
    invalidated: bool,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        !self.invalidated && self.quote.fetched_at.elapsed() < FRESHNESS_WINDOW
    }
}

/// Latest quote per `(asset, currency)` with serve-stale-on-error.
pub struct QuoteCache {
    source: Arc<dyn PriceSource>,
    entries: RwLock<HashMap<QuoteKey, CacheEntry>>,
    inflight: DashMap<QuoteKey, Arc<tokio::sync::Mutex<()>>>,
    fetch_timeout: Duration,
}

enum Lookup {
    Fresh(Arc<Quote>),
    Stale(Option<Arc<Quote>>),
}

impl QuoteCache {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::with_timeout(source, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(source: Arc<dyn PriceSource>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            inflight: DashMap::new(),
            fetch_timeout,
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    fn lookup(&self, key: &QuoteKey) -> Lookup {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if entry.is_fresh() => Lookup::Fresh(entry.quote.clone()),
            Some(entry) => Lookup::Stale(Some(entry.quote.clone())),
            None => Lookup::Stale(None),
        }
    }

    /// Returns the cached quote while fresh, otherwise refreshes from upstream.
    /// On upstream failure the previous quote is returned unchanged if there is one.
    pub async fn get_quote(&self, asset: &str, currency: &str) -> Result<Arc<Quote>, PricingError> {
        let key = QuoteKey::new(asset, currency);
        if key.asset.is_empty() || key.currency.is_empty() {
            return Err(PricingError::invalid("asset and currency must not be empty"));
        }

        if let Lookup::Fresh(quote) = self.lookup(&key) {
            return Ok(quote);
        }

        // One upstream fetch per key at a time; waiters re-check after the lock.
        let lock = self.inflight.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.refresh(&key).await
        };
        drop(lock);

        // Last holder out removes the lock so the map tracks only pending fetches.
        self.inflight
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn refresh(&self, key: &QuoteKey) -> Result<Arc<Quote>, PricingError> {
        let previous = match self.lookup(key) {
            Lookup::Fresh(quote) => return Ok(quote),
            Lookup::Stale(previous) => previous,
        };

        match self.fetch(key).await {
            Ok(quote) => {
                let quote = Arc::new(quote);
                self.entries.write().insert(
                    key.clone(),
                    CacheEntry {
                        quote: quote.clone(),
                        invalidated: false,
                    },
                );
                tracing::debug!("Refreshed {} from {}: {}", key, self.source.name(), quote.price);
                Ok(quote)
            }
            Err(e) => match previous {
                Some(stale) => {
                    tracing::warn!("Using stale quote for {} due to fetch error: {}", key, e);
                    Ok(stale)
                }
                None if e.is_unsupported() => {
                    Err(PricingError::invalid(format!("unsupported pair {}", key)))
                }
                None => Err(PricingError::UpstreamUnavailable {
                    asset: key.asset.clone(),
                    currency: key.currency.clone(),
                    reason: e.to_string(),
                }),
            },
        }
    }

    async fn fetch(&self, key: &QuoteKey) -> Result<Quote, SourceError> {
        let tick = timeout(
            self.fetch_timeout,
            self.source.fetch_price(&key.asset, &key.currency),
        )
        .await
        .map_err(|_| SourceError::Timeout(self.fetch_timeout.as_millis() as u64))??;

        if tick.price <= Decimal::ZERO {
            return Err(SourceError::Parse(format!("non-positive price {}", tick.price)));
        }

        Ok(Quote {
            asset: key.asset.clone(),
            currency: key.currency.clone(),
            price: tick.price,
            change_24h: tick.change_24h,
            source: self.source.name(),
            source_timestamp: tick.timestamp,
            fetched_at: Instant::now(),
        })
    }

    /// Forces the next lookup of every cached pair of `assets` to go upstream.
    /// The quotes stay in place as stale fallback.
    pub fn invalidate<S: AsRef<str>>(&self, assets: &[S]) -> usize {
        let assets: Vec<String> = assets
            .iter()
            .map(|a| a.as_ref().trim().to_uppercase())
            .collect();

        let mut entries = self.entries.write();
        let mut flagged = 0;
        for (key, entry) in entries.iter_mut() {
            if assets.contains(&key.asset) {
                entry.invalidated = true;
                flagged += 1;
            }
        }

        if flagged > 0 {
            tracing::debug!("Invalidated {} cached quotes for {:?}", flagged, assets);
        }
        flagged
    }

    /// Cached quote regardless of age, without going upstream.
    pub fn peek(&self, asset: &str, currency: &str) -> Option<Arc<Quote>> {
        let key = QuoteKey::new(asset, currency);
        self.entries.read().get(&key).map(|e| e.quote.clone())
    }

    pub fn get_all(&self) -> Vec<Arc<Quote>> {
        let entries = self.entries.read();
        entries.values().map(|e| e.quote.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
