//! Relay price source
//!
//! Batched feed simulation against a relay service, with a primary and an
//! optional fallback host. Keys are chunked to the relay's per-request limit
//! and the chunks run concurrently; within a chunk the fallback is tried once
//! after a primary failure, with an independent timeout. A feed whose first
//! sample is absent or non-finite is treated as broken and reported
//! `Unknown`; a healthy feed prices at the median of its samples with zero
//! confidence and an observation-time timestamp.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::config::RelayConfig;
use crate::errors::EngineError;
use crate::oracle::median;
use crate::rpc::chunks;
use crate::types::{FeedKey, OraclePriceRecord, Price, PriceResult};

/// One simulated feed in a relay response.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySimulation {
    #[serde(rename = "feedHash")]
    pub feed_hash: String,
    pub results: Vec<Option<f64>>,
}

/// Transport seam for the relay HTTP call.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn simulate(
        &self,
        endpoint: &str,
        keys: &[FeedKey],
        timeout: Duration,
    ) -> Result<Vec<RelaySimulation>, EngineError>;
}

/// Production transport: GET `{endpoint}/simulate/{key,key,...}`.
pub struct HttpRelayTransport {
    client: reqwest::Client,
}

impl HttpRelayTransport {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
        })
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn simulate(
        &self,
        endpoint: &str,
        keys: &[FeedKey],
        timeout: Duration,
    ) -> Result<Vec<RelaySimulation>, EngineError> {
        let joined = keys
            .iter()
            .map(FeedKey::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/simulate/{}", endpoint.trim_end_matches('/'), joined);

        let response = self.client.get(&url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Rpc(format!(
                "relay returned status {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

pub struct RelaySource {
    transport: Arc<dyn RelayTransport>,
    primary_endpoint: String,
    fallback_endpoint: Option<String>,
    chunk_size: usize,
    timeout: Duration,
}

impl RelaySource {
    pub fn new(config: &RelayConfig) -> Result<Self, EngineError> {
        Ok(Self::with_transport(
            config,
            Arc::new(HttpRelayTransport::new()?),
        ))
    }

    pub fn with_transport(config: &RelayConfig, transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            transport,
            primary_endpoint: config.primary_endpoint.clone(),
            fallback_endpoint: config.fallback_endpoint.clone(),
            chunk_size: config.chunk_size.max(1),
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    /// Fetch the given feeds. The result map covers every requested key; a
    /// chunk that fails on both hosts marks its keys `Unknown`.
    pub async fn fetch(&self, keys: &[FeedKey]) -> HashMap<FeedKey, PriceResult> {
        if keys.is_empty() {
            return HashMap::new();
        }

        let key_chunks = chunks(keys, self.chunk_size);
        let fetches = key_chunks.iter().map(|chunk| self.fetch_chunk(chunk));

        let mut results = HashMap::with_capacity(keys.len());
        for chunk_results in join_all(fetches).await {
            results.extend(chunk_results);
        }
        results
    }

    async fn fetch_chunk(&self, keys: &[FeedKey]) -> HashMap<FeedKey, PriceResult> {
        let simulations = match self
            .transport
            .simulate(&self.primary_endpoint, keys, self.timeout)
            .await
        {
            Ok(simulations) => Some(simulations),
            Err(error) => {
                warn!(feeds = keys.len(), %error, "primary relay request failed");
                match &self.fallback_endpoint {
                    Some(fallback) => {
                        match self.transport.simulate(fallback, keys, self.timeout).await {
                            Ok(simulations) => Some(simulations),
                            Err(error) => {
                                warn!(feeds = keys.len(), %error, "fallback relay request failed");
                                None
                            }
                        }
                    }
                    None => None,
                }
            }
        };

        let Some(simulations) = simulations else {
            return keys
                .iter()
                .map(|key| (key.clone(), PriceResult::Unknown))
                .collect();
        };

        let by_hash: HashMap<&str, &RelaySimulation> = simulations
            .iter()
            .map(|sim| (sim.feed_hash.as_str(), sim))
            .collect();
        let observed_at = chrono::Utc::now().timestamp();

        keys.iter()
            .map(|key| {
                let result = by_hash
                    .get(key.as_str())
                    .map(|sim| simulation_to_result(key, sim, observed_at))
                    .unwrap_or_else(|| {
                        warn!(feed = %key, "relay response missing feed");
                        PriceResult::Unknown
                    });
                (key.clone(), result)
            })
            .collect()
    }
}

fn simulation_to_result(key: &FeedKey, sim: &RelaySimulation, observed_at: i64) -> PriceResult {
    // Broken feed: no samples, or the first sample absent or non-finite.
    let broken = match sim.results.first() {
        None => true,
        Some(None) => true,
        Some(Some(value)) => !value.is_finite(),
    };
    if broken {
        warn!(feed = %key, "relay feed is broken");
        return PriceResult::Unknown;
    }

    let samples: Vec<Decimal> = sim
        .results
        .iter()
        .filter_map(|sample| *sample)
        .filter(|value| value.is_finite())
        .filter_map(|value| Decimal::try_from(value).ok())
        .collect();

    match median(&samples) {
        Some(price) if price > Decimal::ZERO => PriceResult::Priced(
            OraclePriceRecord::unweighted(
                Price::with_confidence(price, Decimal::ZERO),
                Some(observed_at),
            ),
        ),
        _ => {
            warn!(feed = %key, "relay feed has no positive median");
            PriceResult::Unknown
        }
    }
}
