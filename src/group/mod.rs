//! Batched account aggregation
//!
//! Resolves one risk group's full bank/mint/oracle account set in the
//! minimum number of round trips. The account list for the bulk read is
//! `[group, bank mints..., emission mints...]`; the positional join back to
//! the bank list relies on the ordering contract of the bulk read. A missing
//! group or mint account fails the whole pass; price-feed problems degrade
//! per feed.

mod feed_map;

pub use feed_map::{FeedMapClient, FeedMapEntry};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::decode::{decode_bank, decode_group, DISCRIMINATOR_LEN};
use crate::errors::EngineError;
use crate::oracle::MultiSourcePriceFetcher;
use crate::rpc::RpcClient;
use crate::types::{
    Address, BankRecord, FeedKey, FeedRequest, MintData, PriceResult, RiskGroup, SourceKind,
};

/// One fully resolved group: banks, their mint data, and a price result per
/// bank. Built fresh on every pass; nothing here is cached or mutated.
pub struct GroupSnapshot {
    pub group: RiskGroup,
    pub banks: Vec<BankRecord>,
    /// Keyed by bank address.
    pub mints: HashMap<Address, MintData>,
    /// Keyed by bank address; `Unknown` where no source could price the feed.
    pub prices: HashMap<Address, PriceResult>,
}

pub struct GroupAggregator {
    rpc: Arc<RpcClient>,
    feed_map: FeedMapClient,
    program_id: Address,
}

impl GroupAggregator {
    pub fn new(rpc: Arc<RpcClient>, feed_map: FeedMapClient, program_id: Address) -> Self {
        Self {
            rpc,
            feed_map,
            program_id,
        }
    }

    /// Resolve the group's bank set and price every bank's feed.
    ///
    /// `bank_addresses` skips discovery when the caller already knows the
    /// bank list; otherwise the program is scanned for banks referencing the
    /// group.
    pub async fn fetch_group(
        &self,
        fetcher: &MultiSourcePriceFetcher,
        group: &Address,
        bank_addresses: Option<&[Address]>,
    ) -> Result<GroupSnapshot, EngineError> {
        let banks = match bank_addresses {
            Some(addresses) => self.load_banks(addresses).await?,
            None => self.scan_banks(group).await?,
        };
        info!(group = %group, banks = banks.len(), "resolving group");

        let emission_mints = emission_mint_set(&banks);
        let mut addresses = Vec::with_capacity(1 + banks.len() + emission_mints.len());
        addresses.push(group.clone());
        addresses.extend(banks.iter().map(|bank| bank.mint.clone()));
        addresses.extend(emission_mints.iter().cloned());

        let relay_keys: Vec<FeedKey> = banks
            .iter()
            .filter(|bank| bank.oracle_source == SourceKind::Relay)
            .map(|bank| bank.oracle_key.clone())
            .collect();

        // The bulk read and the feed-map fetch have no ordering dependency.
        let (accounts, feed_map) = tokio::join!(
            self.rpc.get_multiple_accounts(&addresses),
            self.feed_map.resolve(&relay_keys),
        );
        let accounts = accounts?;

        let group_account = accounts[0]
            .as_ref()
            .ok_or_else(|| EngineError::MissingGroupAccount(group.clone()))?;
        let risk_group = decode_group(group.clone(), &group_account.data).map_err(|source| {
            EngineError::AccountDecode {
                address: group.clone(),
                source,
            }
        })?;

        // Emission mint owners, keyed by mint; absent accounts tolerated.
        let emission_owners: HashMap<Address, Address> = emission_mints
            .iter()
            .zip(&accounts[1 + banks.len()..])
            .filter_map(|(mint, account)| {
                account
                    .as_ref()
                    .map(|raw| (mint.clone(), raw.owner.clone()))
            })
            .collect();

        let mut mints = HashMap::with_capacity(banks.len());
        for (bank, account) in banks.iter().zip(&accounts[1..1 + banks.len()]) {
            let raw = account
                .as_ref()
                .ok_or_else(|| EngineError::MissingMintAccount {
                    bank: bank.address.clone(),
                    mint: bank.mint.clone(),
                })?;
            mints.insert(
                bank.address.clone(),
                MintData {
                    mint: bank.mint.clone(),
                    token_program: raw.owner.clone(),
                    emissions_token_program: bank
                        .emissions_mint
                        .as_ref()
                        .and_then(|mint| emission_owners.get(mint).cloned()),
                },
            );
        }

        let (requests, effective_keys) = build_feed_requests(&banks, &feed_map);
        let price_map = fetcher.fetch_prices(&requests).await;

        let prices = banks
            .iter()
            .map(|bank| {
                let result = effective_keys
                    .get(&bank.address)
                    .and_then(|key| price_map.get(key))
                    .cloned()
                    .unwrap_or(PriceResult::Unknown);
                (bank.address.clone(), result)
            })
            .collect();

        Ok(GroupSnapshot {
            group: risk_group,
            banks,
            mints,
            prices,
        })
    }

    async fn load_banks(&self, addresses: &[Address]) -> Result<Vec<BankRecord>, EngineError> {
        let accounts = self.rpc.get_multiple_accounts(addresses).await?;
        addresses
            .iter()
            .zip(accounts)
            .map(|(address, account)| {
                let raw = account
                    .ok_or_else(|| EngineError::MissingBankAccount(address.clone()))?;
                decode_bank(address.clone(), &raw.data).map_err(|source| {
                    EngineError::AccountDecode {
                        address: address.clone(),
                        source,
                    }
                })
            })
            .collect()
    }

    async fn scan_banks(&self, group: &Address) -> Result<Vec<BankRecord>, EngineError> {
        // The group key sits right after the discriminator in bank accounts.
        let matches = self
            .rpc
            .get_program_accounts(&self.program_id, DISCRIMINATOR_LEN, group.as_str())
            .await?;

        let mut banks = Vec::with_capacity(matches.len());
        for (address, raw) in matches {
            match decode_bank(address.clone(), &raw.data) {
                Ok(bank) => banks.push(bank),
                Err(error) => {
                    // Scan results can include same-shaped non-bank accounts.
                    warn!(account = %address, %error, "skipping undecodable scan result");
                }
            }
        }
        Ok(banks)
    }
}

/// Distinct non-default emission mints, in first-seen order.
fn emission_mint_set(banks: &[BankRecord]) -> Vec<Address> {
    let mut seen = HashSet::new();
    banks
        .iter()
        .filter_map(|bank| bank.emissions_mint.clone())
        .filter(|mint| !mint.is_default() && seen.insert(mint.clone()))
        .collect()
}

/// One feed request per pricable bank, plus each bank's effective feed key
/// for joining results back. Relay banks route through the feed map; a bank
/// whose oracle key has no mapping gets no request and stays unknown.
fn build_feed_requests(
    banks: &[BankRecord],
    feed_map: &HashMap<FeedKey, FeedMapEntry>,
) -> (Vec<FeedRequest>, HashMap<Address, FeedKey>) {
    let mut requests = Vec::with_capacity(banks.len());
    let mut effective_keys = HashMap::with_capacity(banks.len());
    for bank in banks {
        let key = match bank.oracle_source {
            SourceKind::Relay => match feed_map.get(&bank.oracle_key) {
                Some(entry) => entry.feed_key.clone(),
                None => {
                    warn!(bank = %bank.address, oracle = %bank.oracle_key, "no feed mapping for relay oracle");
                    continue;
                }
            },
            SourceKind::OnChain | SourceKind::Aggregator => bank.oracle_key.clone(),
        };
        requests.push(FeedRequest::new(key.clone(), bank.oracle_source));
        effective_keys.insert(bank.address.clone(), key);
    }
    (requests, effective_keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bank(address: &str, source: SourceKind, oracle: &str, emissions: Option<&str>) -> BankRecord {
        BankRecord {
            address: Address::new(address),
            group: Address::new("group"),
            mint: Address::new(format!("{address}-mint")),
            emissions_mint: emissions.map(Address::new),
            oracle_key: FeedKey::new(oracle),
            oracle_source: source,
            asset_weight_init: dec!(0.7),
            asset_weight_maint: dec!(0.8),
            emode_tag: crate::types::EmodeTag::UNSET,
            emode_entries: Vec::new(),
        }
    }

    #[test]
    fn emission_mints_are_deduplicated_in_order() {
        let banks = [
            bank("a", SourceKind::OnChain, "oa", Some("m1")),
            bank("b", SourceKind::OnChain, "ob", Some("m2")),
            bank("c", SourceKind::OnChain, "oc", Some("m1")),
            bank("d", SourceKind::OnChain, "od", None),
        ];
        assert_eq!(
            emission_mint_set(&banks),
            vec![Address::new("m1"), Address::new("m2")]
        );
    }

    #[test]
    fn relay_banks_route_through_the_feed_map() {
        let banks = [
            bank("a", SourceKind::OnChain, "oa", None),
            bank("b", SourceKind::Relay, "ob", None),
        ];
        let feed_map = HashMap::from([(
            FeedKey::new("ob"),
            FeedMapEntry {
                feed_key: FeedKey::new("hash-b"),
                shard_id: Some(1),
            },
        )]);

        let (requests, effective_keys) = build_feed_requests(&banks, &feed_map);
        assert_eq!(requests.len(), 2);
        assert!(requests.contains(&FeedRequest::new(FeedKey::new("oa"), SourceKind::OnChain)));
        assert!(requests.contains(&FeedRequest::new(FeedKey::new("hash-b"), SourceKind::Relay)));
        assert_eq!(effective_keys[&Address::new("b")], FeedKey::new("hash-b"));
    }

    #[test]
    fn unmapped_relay_oracle_gets_no_request() {
        let banks = [bank("a", SourceKind::Relay, "oa", None)];
        let (requests, effective_keys) = build_feed_requests(&banks, &HashMap::new());
        assert!(requests.is_empty());
        assert!(!effective_keys.contains_key(&Address::new("a")));
    }
}
