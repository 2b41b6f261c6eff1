//! Off-chain aggregator price source
//!
//! One authenticated POST for the whole batch of feed keys. The API reports
//! decimal values as strings; anything unparseable or zero degrades to
//! `Unknown` for that feed only.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::AggregatorConfig;
use crate::errors::EngineError;
use crate::oracle::cap_confidence;
use crate::types::{FeedKey, OraclePriceRecord, Price, PriceResult};

#[derive(Debug, Deserialize)]
struct AggregatorFeed {
    value: String,
    confidence: String,
    last_updated_ts: Option<i64>,
}

pub struct AggregatorSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_confidence_ratio: Decimal,
}

impl AggregatorSource {
    pub fn new(
        config: &AggregatorConfig,
        api_key: Option<String>,
        max_confidence_ratio: Decimal,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            max_confidence_ratio,
        })
    }

    /// Fetch the given feeds in one request. The result map covers every
    /// requested key; a failed request marks all of them `Unknown`.
    pub async fn fetch(&self, keys: &[FeedKey]) -> HashMap<FeedKey, PriceResult> {
        if keys.is_empty() {
            return HashMap::new();
        }

        let feeds = match self.request(keys).await {
            Ok(feeds) => feeds,
            Err(error) => {
                warn!(feeds = keys.len(), %error, "aggregator request failed");
                return keys
                    .iter()
                    .map(|key| (key.clone(), PriceResult::Unknown))
                    .collect();
            }
        };

        keys.iter()
            .map(|key| {
                let result = feeds
                    .get(key.as_str())
                    .map(|feed| self.to_result(key, feed))
                    .unwrap_or(PriceResult::Unknown);
                (key.clone(), result)
            })
            .collect()
    }

    async fn request(
        &self,
        keys: &[FeedKey],
    ) -> Result<HashMap<String, AggregatorFeed>, EngineError> {
        let ids: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let mut request = self.client.post(&self.endpoint).json(&json!({ "ids": ids }));
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Rpc(format!(
                "aggregator returned status {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    fn to_result(&self, key: &FeedKey, feed: &AggregatorFeed) -> PriceResult {
        let (Ok(value), Ok(confidence)) = (
            feed.value.parse::<Decimal>(),
            feed.confidence.parse::<Decimal>(),
        ) else {
            warn!(feed = %key, "aggregator returned unparseable decimals");
            return PriceResult::Unknown;
        };
        if value <= Decimal::ZERO {
            warn!(feed = %key, "aggregator reporting zero price");
            return PriceResult::Unknown;
        }
        // The capper requires non-negative inputs; a negative confidence
        // would invert the price band.
        if confidence < Decimal::ZERO {
            warn!(feed = %key, "aggregator reporting negative confidence");
            return PriceResult::Unknown;
        }

        let price = Price::with_confidence(
            value,
            cap_confidence(value, confidence, self.max_confidence_ratio),
        );
        PriceResult::Priced(OraclePriceRecord::unweighted(price, feed.last_updated_ts))
    }
}
