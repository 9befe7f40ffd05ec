use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use super::{PriceSource, PriceTick, SourceError};

/// HTTP client for a Reflector-style oracle gateway.
pub struct ReflectorSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReflectorPrice {
    price: serde_json::Number,
    timestamp: Option<i64>,
    #[serde(rename = "change24h")]
    change_24h: Option<f64>,
}

impl ReflectorSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn price_url(&self, asset: &str, currency: &str) -> String {
        format!(
            "{}/prices/{}?currency={}",
            self.base_url,
            asset.to_uppercase(),
            currency.to_uppercase()
        )
    }
}

fn parse_tick(body: ReflectorPrice) -> Result<PriceTick, SourceError> {
    // Parse from the textual form so 0.12 stays 0.12.
    let price: Decimal = body
        .price
        .to_string()
        .parse()
        .map_err(|e| SourceError::Parse(format!("price {}: {}", body.price, e)))?;

    let timestamp: DateTime<Utc> = match body.timestamp {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| SourceError::Parse(format!("timestamp {}", ms)))?,
        None => Utc::now(),
    };

    let change_24h = body
        .change_24h
        .and_then(|c| c.to_string().parse::<Decimal>().ok());

    Ok(PriceTick {
        price,
        timestamp,
        change_24h,
    })
}

#[async_trait]
impl PriceSource for ReflectorSource {
    fn name(&self) -> &'static str {
        "Reflector"
    }

    async fn fetch_price(&self, asset: &str, currency: &str) -> Result<PriceTick, SourceError> {
        let url = self.price_url(asset, currency);

        let resp = self.client.get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(SourceError::RateLimit),
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound),
            s if !s.is_success() => {
                return Err(SourceError::Network(format!("HTTP {} from {}", s, url)))
            }
            _ => {}
        }

        let body: ReflectorPrice = resp.json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        parse_tick(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_url() {
        let source = ReflectorSource::new("https://api.reflector.network/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            "https://api.reflector.network/prices/XLM?currency=EUR",
            source.price_url("xlm", "eur")
        );
    }

    #[test]
    fn test_parse_tick() {
        let body: ReflectorPrice = serde_json::from_str(
            r#"{"price":0.12,"timestamp":1700000000000,"change24h":-1.5}"#,
        )
        .unwrap();
        let tick = parse_tick(body).unwrap();
        assert_eq!(dec!(0.12), tick.price);
        assert_eq!(1_700_000_000_000, tick.timestamp.timestamp_millis());
        assert_eq!(Some(dec!(-1.5)), tick.change_24h);
    }

    #[test]
    fn test_parse_tick_without_optional_fields() {
        let body: ReflectorPrice = serde_json::from_str(r#"{"price":43000}"#).unwrap();
        let tick = parse_tick(body).unwrap();
        assert_eq!(dec!(43000), tick.price);
        assert!(tick.change_24h.is_none());
    }
}
