use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_pricer::api::{create_rest_router, AppState};
use ticket_pricer::config::Config;
use ticket_pricer::format::{format_price, format_price_change};
use ticket_pricer::services::{PricingCalculator, QuoteCache, QuoteRefresher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticket_pricer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_from(&config_path)?;
    tracing::info!("✓ Configuration loaded from {}", config_path);

    let source = config.oracle.build_source()?;
    tracing::info!("✓ Price source: {}", source.name());

    let cache = Arc::new(QuoteCache::with_timeout(source, config.oracle.timeout()));
    let calculator = Arc::new(
        PricingCalculator::new(cache.clone()).with_precision(config.pricing.precision.clone()),
    );

    // Warm the cache for the default pair so the first request is served fresh.
    match cache
        .get_quote(&config.pricing.target_asset, &config.pricing.base_currency)
        .await
    {
        Ok(quote) => {
            let change = quote
                .change_24h
                .map(format_price_change)
                .unwrap_or_else(|| "n/a".to_string());
            tracing::info!(
                "✓ {} = {} ({} 24h)",
                quote.asset,
                format_price(quote.price, &quote.currency),
                change
            );
        }
        Err(e) => tracing::warn!("Initial quote unavailable: {}", e),
    }

    let refresher = QuoteRefresher::new(
        calculator.clone(),
        config.pricing.supported_assets.clone(),
        config.pricing.supported_currencies.clone(),
        config.refresh.interval(),
    )
    .spawn();

    let state = Arc::new(AppState {
        calculator,
        updates: Some(refresher.feed()),
        assets: config.pricing.supported_assets.clone(),
        currencies: config.pricing.supported_currencies.clone(),
        fx_currencies: config.pricing.fx_currencies.clone(),
    });

    let app = create_rest_router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("✓ Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Ctrl+C pressed. Stopping...");
        })
        .await?;

    refresher.stop().await;

    tracing::info!("All tasks finished.");
    Ok(())
}
