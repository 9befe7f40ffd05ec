use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use crate::models::PriceBoardUpdate;
use super::PricingCalculator;

const CHANNEL_CAPACITY: usize = 16;

/// Periodically forces a refresh of the configured assets and publishes the
/// resulting price boards.
pub struct QuoteRefresher {
    calculator: Arc<PricingCalculator>,
    assets: Vec<String>,
    currencies: Vec<String>,
    period: Duration,
}

/// Handle to a running refresher. Dropping it does not stop the loop; call
/// [`Subscription::stop`].
pub struct Subscription {
    feed: UpdateFeed,
    stop_signal: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Read side of a refresher, cheap to clone into request handlers.
#[derive(Clone)]
pub struct UpdateFeed {
    updates: broadcast::Sender<PriceBoardUpdate>,
    latest: Arc<RwLock<Option<PriceBoardUpdate>>>,
}

impl QuoteRefresher {
    pub fn new(
        calculator: Arc<PricingCalculator>,
        assets: Vec<String>,
        currencies: Vec<String>,
        period: Duration,
    ) -> Self {
        Self {
            calculator,
            assets,
            currencies,
            period,
        }
    }

    async fn refresh(&self) -> PriceBoardUpdate {
        self.calculator.cache().invalidate(self.assets.as_slice());
        let boards = self
            .calculator
            .asset_prices(self.assets.as_slice(), self.currencies.as_slice())
            .await;

        PriceBoardUpdate {
            boards,
            timestamp: Utc::now(),
        }
    }

    pub fn spawn(self) -> Subscription {
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);
        let latest = Arc::new(RwLock::new(None));
        let (stop_signal, mut stop_recv) = oneshot::channel();

        let tx = updates.clone();
        let latest_slot = latest.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                "Refreshing {:?} in {:?} every {:?}",
                self.assets, self.currencies, self.period
            );

            loop {
                tokio::select! {
                    _ = &mut stop_recv => {
                        tracing::info!("Stop signal received, refresher quitting");
                        break;
                    }
                    _ = ticker.tick() => {
                        let update = self.refresh().await;
                        let priced = update
                            .boards
                            .iter()
                            .flat_map(|b| b.prices.iter())
                            .filter(|p| p.quote.is_some())
                            .count();
                        tracing::debug!("Refresh cycle done, {} prices available", priced);

                        *latest_slot.write() = Some(update.clone());
                        if tx.send(update).is_err() {
                            tracing::trace!("No subscribers for price update");
                        }
                    }
                }
            }
        });

        Subscription {
            feed: UpdateFeed { updates, latest },
            stop_signal,
            handle,
        }
    }
}

impl Subscription {
    pub fn feed(&self) -> UpdateFeed {
        self.feed.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PriceBoardUpdate> {
        self.feed.subscribe()
    }

    pub fn latest(&self) -> Option<PriceBoardUpdate> {
        self.feed.latest()
    }

    pub async fn stop(self) {
        if self.stop_signal.send(()).is_err() {
            tracing::warn!("Refresher loop already finished");
        }
        let _ = self.handle.await;
    }
}

impl UpdateFeed {
    pub fn subscribe(&self) -> broadcast::Receiver<PriceBoardUpdate> {
        self.updates.subscribe()
    }

    /// Most recently published update, if any.
    pub fn latest(&self) -> Option<PriceBoardUpdate> {
        self.latest.read().clone()
    }
}
