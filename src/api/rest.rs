use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::error::PricingError;
use crate::format;
use crate::models::{
    AssetPrices, CurrencyExpansion, FxRates, MarketSummary, PricingRequest, PricingResult, QuoteView,
};
use crate::services::{PricingCalculator, UpdateFeed};
use super::websocket::ws_handler;

pub struct AppState {
    pub calculator: Arc<PricingCalculator>,
    pub updates: Option<UpdateFeed>,
    pub assets: Vec<String>,
    pub currencies: Vec<String>,
    pub fx_currencies: Vec<String>,
}

pub struct ApiError(PricingError);

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PricingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PricingError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct PricingView {
    #[serde(flatten)]
    result: PricingResult,
    rounded_amount: Decimal,
    formatted_amount: String,
    demand_description: &'static str,
    equivalent_fiat: String,
    asset_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpandQuery {
    amount: Decimal,
    #[serde(default)]
    asset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FxQuery {
    #[serde(default = "default_fiat")]
    base: String,
}

#[derive(Debug, Deserialize)]
struct MarketQuery {
    #[serde(default = "default_fiat")]
    currency: String,
}

fn default_fiat() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
struct InvalidateBody {
    assets: Vec<String>,
}

/// GET /quotes/:asset/:currency
async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path((asset, currency)): Path<(String, String)>,
) -> Result<Json<QuoteView>, ApiError> {
    let quote = state.calculator.cache().get_quote(&asset, &currency).await?;
    Ok(Json(quote.view()))
}

/// POST /quotes/invalidate
async fn invalidate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InvalidateBody>,
) -> Json<serde_json::Value> {
    let flagged = state.calculator.cache().invalidate(body.assets.as_slice());
    Json(serde_json::json!({ "invalidated": flagged }))
}

/// GET /pricing
async fn get_pricing(
    State(state): State<Arc<AppState>>,
    Query(req): Query<PricingRequest>,
) -> Result<Json<PricingView>, ApiError> {
    let result = state.calculator.compute_asset_amount(&req).await?;
    Ok(Json(PricingView {
        rounded_amount: result.rounded_amount(),
        formatted_amount: result.formatted_amount(),
        demand_description: result.demand_level.description(),
        equivalent_fiat: format::format_price(result.base_price, &result.base_currency),
        asset_value: format::price_in_currency(
            result.asset_amount,
            result.asset_price,
            &result.base_currency,
        ),
        result,
    }))
}

/// GET /pricing/currencies
async fn get_currency_expansion(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpandQuery>,
) -> Result<Json<CurrencyExpansion>, ApiError> {
    let asset = query.asset.unwrap_or_else(|| "XLM".to_string());
    let expansion = state
        .calculator
        .expand_to_currencies(query.amount, &asset, state.currencies.as_slice())
        .await?;
    Ok(Json(expansion))
}

/// GET /prices
async fn get_prices(State(state): State<Arc<AppState>>) -> Json<Vec<AssetPrices>> {
    let boards = state
        .calculator
        .asset_prices(state.assets.as_slice(), state.currencies.as_slice())
        .await;
    Json(boards)
}

/// GET /fx
async fn get_fx_rates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FxQuery>,
) -> Result<Json<FxRates>, ApiError> {
    let rates = state
        .calculator
        .fx_rates(&query.base, state.fx_currencies.as_slice())
        .await?;
    Ok(Json(rates))
}

/// GET /market
async fn get_market(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<MarketSummary>, ApiError> {
    let summary = state.calculator.market_summary(&query.currency).await?;
    Ok(Json(summary))
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

/// GET /stats
async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cache = state.calculator.cache();
    Json(serde_json::json!({
        "cached_quotes": cache.len(),
        "source": cache.source_name(),
        "assets": state.assets.len(),
        "currencies": state.currencies.len(),
    }))
}

pub fn create_rest_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/quotes/:asset/:currency", get(get_quote))
        .route("/quotes/invalidate", post(invalidate))
        .route("/pricing", get(get_pricing))
        .route("/pricing/currencies", get(get_currency_expansion))
        .route("/prices", get(get_prices))
        .route("/fx", get(get_fx_rates))
        .route("/market", get(get_market))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/ws", get(ws_handler))
        .with_state(state)
}
