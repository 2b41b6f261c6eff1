//! On-chain price source
//!
//! Reads feed accounts directly over JSON-RPC and decodes the binary price
//! message. The bulk read is ordered, so key i pairs with account i.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::decode::{decode_price_feed, DISCRIMINATOR_LEN};
use crate::rpc::RpcClient;
use crate::types::{Address, FeedKey, PriceResult};

pub struct OnChainSource {
    rpc: Arc<RpcClient>,
    max_confidence_ratio: Decimal,
}

impl OnChainSource {
    pub fn new(rpc: Arc<RpcClient>, max_confidence_ratio: Decimal) -> Self {
        Self {
            rpc,
            max_confidence_ratio,
        }
    }

    /// Fetch and decode the given feed accounts. The result map covers every
    /// requested key; a missing account, a decode failure, or a zero-price
    /// record maps to `Unknown`.
    pub async fn fetch(&self, keys: &[FeedKey]) -> HashMap<FeedKey, PriceResult> {
        if keys.is_empty() {
            return HashMap::new();
        }

        let addresses: Vec<Address> = keys.iter().map(|k| Address::new(k.as_str())).collect();
        let accounts = match self.rpc.get_multiple_accounts(&addresses).await {
            Ok(accounts) => accounts,
            Err(error) => {
                warn!(feeds = keys.len(), %error, "on-chain feed read failed");
                return keys
                    .iter()
                    .map(|key| (key.clone(), PriceResult::Unknown))
                    .collect();
            }
        };

        keys.iter()
            .zip(accounts)
            .map(|(key, account)| (key.clone(), self.decode_account(key, account)))
            .collect()
    }

    fn decode_account(
        &self,
        key: &FeedKey,
        account: Option<crate::rpc::RawAccount>,
    ) -> PriceResult {
        let Some(raw) = account else {
            warn!(feed = %key, "feed account not found");
            return PriceResult::Unknown;
        };
        if raw.data.len() <= DISCRIMINATOR_LEN {
            warn!(feed = %key, len = raw.data.len(), "feed account too short");
            return PriceResult::Unknown;
        }

        match decode_price_feed(&raw.data[DISCRIMINATOR_LEN..], self.max_confidence_ratio) {
            Ok(record) if record.realtime.is_zero() => {
                warn!(feed = %key, "feed reporting zero price");
                PriceResult::Unknown
            }
            Ok(record) => PriceResult::Priced(record),
            Err(error) => {
                warn!(feed = %key, %error, "feed account failed to decode");
                PriceResult::Unknown
            }
        }
    }
}
