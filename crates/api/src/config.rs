//! Application configuration loaded from environment variables.

use std::time::Duration;

use client::{BreakerConfig, ErpConfig, RetryPolicy};
use common::Sku;
use engine::{InventorySyncConfig, ResolverConfig};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        _ => default.iter().map(|item| item.to_string()).collect(),
    }
}

/// Adapter configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT` — bind address (default `0.0.0.0:8080`)
/// - `ERP_URL`, `ERP_DB`, `ERP_USER`, `ERP_PASSWORD`, `ERP_SKU_FIELD`
/// - `CONTEXT_STORE_URL` — entity API base URL
/// - `STOCK_LOCATIONS` — comma-separated location names counted toward
///   availability (default `Stock,WH/Stock`)
/// - `STOCK_EPSILON` — float comparison epsilon (default `1e-6`)
/// - `TRACKED_SKUS` — comma-separated SKUs for the inventory sync loop
/// - `SYNC_INTERVAL_SECS` — inventory sync cadence (default `600`)
/// - `MAX_RETRIES`, `RETRY_BASE_MS` — facade retry policy
/// - `BREAKER_THRESHOLD`, `BREAKER_COOL_DOWN_SECS` — circuit breaker
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub erp_url: String,
    pub erp_database: String,
    pub erp_username: String,
    pub erp_password: String,
    pub erp_sku_field: String,

    pub context_store_url: String,

    pub stock_locations: Vec<String>,
    pub stock_epsilon: f64,
    pub tracked_skus: Vec<String>,
    pub sync_interval: Duration,

    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub breaker_threshold: u32,
    pub breaker_cool_down: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 8080),
            erp_url: env_or("ERP_URL", "http://localhost:8069/jsonrpc"),
            erp_database: env_or("ERP_DB", "erp"),
            erp_username: env_or("ERP_USER", "admin"),
            erp_password: env_or("ERP_PASSWORD", "admin"),
            erp_sku_field: env_or("ERP_SKU_FIELD", "default_code"),
            context_store_url: env_or("CONTEXT_STORE_URL", "http://localhost:1026"),
            stock_locations: env_list("STOCK_LOCATIONS", &["Stock", "WH/Stock"]),
            stock_epsilon: env_parse("STOCK_EPSILON", 1e-6),
            tracked_skus: env_list("TRACKED_SKUS", &[]),
            sync_interval: Duration::from_secs(env_parse("SYNC_INTERVAL_SECS", 600)),
            max_retries: env_parse("MAX_RETRIES", 3),
            retry_base_delay: Duration::from_millis(env_parse("RETRY_BASE_MS", 500)),
            breaker_threshold: env_parse("BREAKER_THRESHOLD", 5),
            breaker_cool_down: Duration::from_secs(env_parse("BREAKER_COOL_DOWN_SECS", 60)),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn erp_config(&self) -> ErpConfig {
        ErpConfig {
            url: self.erp_url.clone(),
            database: self.erp_database.clone(),
            username: self.erp_username.clone(),
            password: self.erp_password.clone(),
            sku_field: self.erp_sku_field.clone(),
            ..ErpConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_base_delay,
            ..RetryPolicy::default()
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_threshold,
            cool_down: self.breaker_cool_down,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            stock_locations: self.stock_locations.clone(),
            epsilon: self.stock_epsilon,
        }
    }

    pub fn sync_config(&self) -> InventorySyncConfig {
        InventorySyncConfig {
            tracked_skus: self.tracked_skus.iter().map(Sku::new).collect(),
            stock_locations: self.stock_locations.clone(),
            interval: self.sync_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            erp_url: "http://localhost:8069/jsonrpc".to_string(),
            erp_database: "erp".to_string(),
            erp_username: "admin".to_string(),
            erp_password: "admin".to_string(),
            erp_sku_field: "default_code".to_string(),
            context_store_url: "http://localhost:1026".to_string(),
            stock_locations: vec!["Stock".to_string(), "WH/Stock".to_string()],
            stock_epsilon: 1e-6,
            tracked_skus: Vec::new(),
            sync_interval: Duration::from_secs(600),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            breaker_threshold: 5,
            breaker_cool_down: Duration::from_secs(60),
        }
    }
}
