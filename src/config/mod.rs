//! Configuration management for the engine
//!
//! Loads from config files + environment variables via .env. Secrets (the
//! aggregator API key) are resolved from the environment only, never from
//! config files.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub rpc: RpcConfig,
    pub aggregator: AggregatorConfig,
    pub relay: RelayConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint for on-chain account reads
    pub endpoint: String,
    /// Provider's maximum addresses per getMultipleAccounts call
    pub max_accounts_per_request: usize,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// The on-chain program owning bank accounts (for filtered scans)
    pub program_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Off-chain aggregator price endpoint
    pub endpoint: String,
    /// Feed-identifier map endpoint
    pub feed_map_endpoint: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Primary relay host
    pub primary_endpoint: String,
    /// Fallback relay host, tried once per chunk after a primary failure
    pub fallback_endpoint: Option<String>,
    /// Relay's documented per-request feed limit
    pub chunk_size: usize,
    /// Per-request timeout in milliseconds (applies to primary and fallback
    /// independently)
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Maximum confidence interval as a ratio of price (e.g. 0.05 = 5%)
    pub max_confidence_ratio: Decimal,
}

impl EngineConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // RPC defaults
            .set_default("rpc.endpoint", "https://api.mainnet-beta.solana.com")?
            .set_default("rpc.max_accounts_per_request", 100)?
            .set_default("rpc.request_timeout_ms", 10_000)?
            .set_default("rpc.program_id", "")?
            // Aggregator defaults
            .set_default("aggregator.endpoint", "")?
            .set_default("aggregator.feed_map_endpoint", "")?
            .set_default("aggregator.request_timeout_ms", 8_000)?
            // Relay defaults
            .set_default("relay.primary_endpoint", "")?
            .set_default("relay.chunk_size", 30)?
            .set_default("relay.request_timeout_ms", 8_000)?
            // Oracle defaults
            .set_default("oracle.max_confidence_ratio", "0.05")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (LENDCORE_*)
            .add_source(Environment::with_prefix("LENDCORE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let engine_config: EngineConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(engine_config)
    }

    /// Resolve the aggregator API key from the environment.
    pub fn aggregator_api_key() -> Option<String> {
        resolve_env(&["LENDCORE_AGGREGATOR_API_KEY", "AGGREGATOR_API_KEY"])
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "rpc={} relay={} fallback={} chunk={} max_conf_ratio={}",
            self.rpc.endpoint,
            self.relay.primary_endpoint,
            self.relay.fallback_endpoint.as_deref().unwrap_or("-"),
            self.relay.chunk_size,
            self.oracle.max_confidence_ratio,
        )
    }
}

fn resolve_env(var_names: &[&str]) -> Option<String> {
    for var in var_names {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    None
}

impl std::fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
