use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use crate::sources::{PriceSource, ReflectorSource, SourceError, SyntheticSource};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Synthetic,
    Reflector,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_target_asset")]
    pub target_asset: String,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_assets")]
    pub supported_assets: Vec<String>,
    #[serde(default = "default_currencies")]
    pub supported_currencies: Vec<String>,
    #[serde(default = "default_fx_currencies")]
    pub fx_currencies: Vec<String>,
    #[serde(default = "default_precision")]
    pub precision: HashMap<String, u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn default_kind() -> SourceKind { SourceKind::Synthetic }
fn default_base_url() -> String { "https://api.reflector.network".to_string() }
fn default_timeout_secs() -> u64 { 5 }
fn default_target_asset() -> String { "XLM".to_string() }
fn default_base_currency() -> String { "USD".to_string() }
fn default_assets() -> Vec<String> {
    ["XLM", "BTC", "ETH", "USDC"].iter().map(|s| s.to_string()).collect()
}
fn default_currencies() -> Vec<String> {
    ["USD", "EUR", "GBP", "JPY"].iter().map(|s| s.to_string()).collect()
}
fn default_fx_currencies() -> Vec<String> {
    ["USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF"].iter().map(|s| s.to_string()).collect()
}
fn default_precision() -> HashMap<String, u32> {
    HashMap::from([("XLM".to_string(), 7)])
}
fn default_interval_secs() -> u64 { 5 }

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            target_asset: default_target_asset(),
            base_currency: default_base_currency(),
            supported_assets: default_assets(),
            supported_currencies: default_currencies(),
            fx_currencies: default_fx_currencies(),
            precision: default_precision(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn build_source(&self) -> Result<Arc<dyn PriceSource>, SourceError> {
        Ok(match self.kind {
            SourceKind::Synthetic => Arc::new(SyntheticSource::new()),
            SourceKind::Reflector => Arc::new(ReflectorSource::new(&self.base_url, self.timeout())?),
        })
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content)?)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
