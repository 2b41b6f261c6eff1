//! Feed-identifier map client
//!
//! Relay-served banks store an oracle account key, but the relay itself is
//! addressed by feed hash. This client resolves one to the other in a single
//! GET. With no endpoint configured the oracle keys are assumed to already be
//! feed hashes and the map is the identity.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::AggregatorConfig;
use crate::errors::EngineError;
use crate::types::FeedKey;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedMapEntry {
    #[serde(rename = "feedKey")]
    pub feed_key: FeedKey,
    #[serde(rename = "shardId")]
    pub shard_id: Option<u16>,
}

pub struct FeedMapClient {
    client: reqwest::Client,
    endpoint: String,
}

impl FeedMapClient {
    pub fn new(config: &AggregatorConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.feed_map_endpoint.clone(),
        })
    }

    /// Resolve oracle keys to relay feed identifiers. A failed request
    /// degrades to an empty map; the affected feeds end up unknown rather
    /// than failing the aggregation pass.
    pub async fn resolve(&self, keys: &[FeedKey]) -> HashMap<FeedKey, FeedMapEntry> {
        if keys.is_empty() {
            return HashMap::new();
        }
        if self.endpoint.is_empty() {
            // Identity map: keys are already feed hashes.
            return keys
                .iter()
                .map(|key| {
                    (
                        key.clone(),
                        FeedMapEntry {
                            feed_key: key.clone(),
                            shard_id: None,
                        },
                    )
                })
                .collect();
        }

        match self.request(keys).await {
            Ok(entries) => entries
                .into_iter()
                .map(|(key, entry)| (FeedKey::new(key), entry))
                .collect(),
            Err(error) => {
                warn!(keys = keys.len(), %error, "feed map request failed");
                HashMap::new()
            }
        }
    }

    async fn request(
        &self,
        keys: &[FeedKey],
    ) -> Result<HashMap<String, FeedMapEntry>, EngineError> {
        let joined = keys
            .iter()
            .map(FeedKey::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("keys", joined)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::Rpc(format!(
                "feed map endpoint returned status {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}
