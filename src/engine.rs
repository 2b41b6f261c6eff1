//! Engine facade
//!
//! The boundary other modules call: resolve a group into an adjusted bank
//! set, or price an explicit feed list. The engine holds no cache and no
//! mutable state; every call builds fresh result structures and callers own
//! retention and refresh cadence.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::emode::{adjust_bank_weights, derive_emode_pairs, EmodeAdjustment};
use crate::errors::EngineError;
use crate::group::{FeedMapClient, GroupAggregator, GroupSnapshot};
use crate::oracle::sources::RelayTransport;
use crate::oracle::MultiSourcePriceFetcher;
use crate::rpc::RpcClient;
use crate::types::{
    Address, AdjustedWeights, BankRecord, EmodePair, FeedKey, FeedRequest, PriceResult,
};

static UNKNOWN: PriceResult = PriceResult::Unknown;

/// One group resolved end to end: the snapshot, the derived pair relation,
/// and the final weights.
pub struct AdjustedBankSet {
    pub snapshot: GroupSnapshot,
    pub pairs: Vec<EmodePair>,
    pub adjustment: EmodeAdjustment,
}

impl AdjustedBankSet {
    pub fn banks(&self) -> &[BankRecord] {
        &self.snapshot.banks
    }

    /// Price result for a bank; explicitly unknown when the bank is missing
    /// or its feed could not be priced.
    pub fn price_for(&self, bank: &Address) -> &PriceResult {
        self.snapshot.prices.get(bank).unwrap_or(&UNKNOWN)
    }

    /// Final collateral weights for a bank, or `None` if the bank is not in
    /// this group.
    pub fn weights_for(&self, bank: &Address) -> Option<AdjustedWeights> {
        self.adjustment.adjusted.get(bank).copied()
    }
}

pub struct Engine {
    aggregator: GroupAggregator,
    fetcher: MultiSourcePriceFetcher,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let rpc = Arc::new(RpcClient::new(&config.rpc)?);
        let fetcher = MultiSourcePriceFetcher::new(config, Arc::clone(&rpc))?;
        Ok(Self {
            aggregator: Self::build_aggregator(config, rpc)?,
            fetcher,
        })
    }

    /// Same as `new` but with a caller-supplied relay transport.
    pub fn with_relay_transport(
        config: &EngineConfig,
        transport: Arc<dyn RelayTransport>,
    ) -> Result<Self, EngineError> {
        let rpc = Arc::new(RpcClient::new(&config.rpc)?);
        let fetcher =
            MultiSourcePriceFetcher::with_relay_transport(config, Arc::clone(&rpc), transport)?;
        Ok(Self {
            aggregator: Self::build_aggregator(config, rpc)?,
            fetcher,
        })
    }

    fn build_aggregator(
        config: &EngineConfig,
        rpc: Arc<RpcClient>,
    ) -> Result<GroupAggregator, EngineError> {
        let feed_map = FeedMapClient::new(&config.aggregator)?;
        Ok(GroupAggregator::new(
            rpc,
            feed_map,
            Address::new(config.rpc.program_id.clone()),
        ))
    }

    /// Resolve a group's banks, price their feeds, and apply e-mode weight
    /// adjustment. `bank_addresses` skips discovery when provided.
    pub async fn get_adjusted_bank_set(
        &self,
        group: &Address,
        bank_addresses: Option<&[Address]>,
    ) -> Result<AdjustedBankSet, EngineError> {
        let snapshot = self
            .aggregator
            .fetch_group(&self.fetcher, group, bank_addresses)
            .await?;

        let pairs = derive_emode_pairs(&snapshot.banks);
        let adjustment = adjust_bank_weights(&snapshot.banks, &pairs);
        info!(
            group = %group,
            banks = snapshot.banks.len(),
            pairs = pairs.len(),
            adjusted = adjustment.original_weights.len(),
            "group resolved"
        );

        Ok(AdjustedBankSet {
            snapshot,
            pairs,
            adjustment,
        })
    }

    /// Price an explicit feed list. Total over the request set: every
    /// requested key resolves to priced or explicitly unknown.
    pub async fn get_prices(
        &self,
        requests: &[FeedRequest],
    ) -> HashMap<FeedKey, PriceResult> {
        self.fetcher.fetch_prices(requests).await
    }
}
