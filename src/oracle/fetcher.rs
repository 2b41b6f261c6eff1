//! Multi-source price fetcher
//!
//! Routes each feed request to its source adapter, runs the three adapters
//! concurrently, and merges the maps. The merged map is total over the
//! request set: every requested key is present, backfilled with `Unknown`
//! when no adapter produced it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::oracle::sources::{AggregatorSource, OnChainSource, RelaySource, RelayTransport};
use crate::rpc::RpcClient;
use crate::types::{FeedKey, FeedRequest, PriceResult, SourceKind};

pub struct MultiSourcePriceFetcher {
    onchain: OnChainSource,
    aggregator: AggregatorSource,
    relay: RelaySource,
}

impl MultiSourcePriceFetcher {
    pub fn new(config: &EngineConfig, rpc: Arc<RpcClient>) -> Result<Self, EngineError> {
        Ok(Self {
            onchain: OnChainSource::new(rpc, config.oracle.max_confidence_ratio),
            aggregator: AggregatorSource::new(
                &config.aggregator,
                EngineConfig::aggregator_api_key(),
                config.oracle.max_confidence_ratio,
            )?,
            relay: RelaySource::new(&config.relay)?,
        })
    }

    /// Same as `new` but with a caller-supplied relay transport.
    pub fn with_relay_transport(
        config: &EngineConfig,
        rpc: Arc<RpcClient>,
        transport: Arc<dyn RelayTransport>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            onchain: OnChainSource::new(rpc, config.oracle.max_confidence_ratio),
            aggregator: AggregatorSource::new(
                &config.aggregator,
                EngineConfig::aggregator_api_key(),
                config.oracle.max_confidence_ratio,
            )?,
            relay: RelaySource::with_transport(&config.relay, transport),
        })
    }

    /// Fetch a price for every request. Total over the request set: the map
    /// holds one entry per distinct requested key, `Unknown` where no source
    /// could price it.
    pub async fn fetch_prices(
        &self,
        requests: &[FeedRequest],
    ) -> HashMap<FeedKey, PriceResult> {
        let mut onchain_keys = Vec::new();
        let mut aggregator_keys = Vec::new();
        let mut relay_keys = Vec::new();
        for request in requests {
            match request.source {
                SourceKind::OnChain => onchain_keys.push(request.key.clone()),
                SourceKind::Aggregator => aggregator_keys.push(request.key.clone()),
                SourceKind::Relay => relay_keys.push(request.key.clone()),
            }
        }

        let (onchain, aggregator, relay) = tokio::join!(
            self.onchain.fetch(&onchain_keys),
            self.aggregator.fetch(&aggregator_keys),
            self.relay.fetch(&relay_keys),
        );

        let mut results = HashMap::with_capacity(requests.len());
        for source_results in [onchain, aggregator, relay] {
            for (key, result) in source_results {
                merge_result(&mut results, key, result);
            }
        }

        // Totality guard: every requested key resolves to something.
        for request in requests {
            if !results.contains_key(&request.key) {
                warn!(feed = %request.key, source = %request.source, "feed missing from source results");
                results.insert(request.key.clone(), PriceResult::Unknown);
            }
        }

        debug!(
            requested = requests.len(),
            priced = results.values().filter(|r| !r.is_unknown()).count(),
            "price fetch complete"
        );
        results
    }
}

/// Insert preferring priced results: a key requested through two sources
/// keeps whichever answer carried a price.
fn merge_result(
    results: &mut HashMap<FeedKey, PriceResult>,
    key: FeedKey,
    result: PriceResult,
) {
    match results.get(&key) {
        Some(existing) if !existing.is_unknown() => {}
        _ => {
            results.insert(key, result);
        }
    }
}
