//! End-to-end engine behavior through the public API: decode and capping,
//! relay fallback and brokenness handling, result-map totality, and e-mode
//! weight adjustment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use lendcore::config::{AggregatorConfig, EngineConfig, OracleConfig, RelayConfig, RpcConfig};
use lendcore::decode::decode_price_feed;
use lendcore::emode::{adjust_bank_weights, derive_emode_pairs};
use lendcore::oracle::sources::{RelaySimulation, RelayTransport};
use lendcore::rpc::chunks;
use lendcore::types::EmodeEntry;
use lendcore::{
    Address, BankRecord, EmodeTag, Engine, EngineError, FeedKey, FeedRequest, PriceResult,
    SourceKind,
};

fn test_config() -> EngineConfig {
    EngineConfig {
        rpc: RpcConfig {
            endpoint: "http://localhost:1".into(),
            max_accounts_per_request: 100,
            request_timeout_ms: 1_000,
            program_id: String::new(),
        },
        aggregator: AggregatorConfig {
            endpoint: "http://localhost:1".into(),
            feed_map_endpoint: String::new(),
            request_timeout_ms: 1_000,
        },
        relay: RelayConfig {
            primary_endpoint: "http://primary".into(),
            fallback_endpoint: Some("http://fallback".into()),
            chunk_size: 30,
            request_timeout_ms: 1_000,
        },
        oracle: OracleConfig {
            max_confidence_ratio: dec!(0.05),
        },
    }
}

/// Relay transport scripted per endpoint; unknown endpoints fail.
struct ScriptedRelay {
    responses: HashMap<String, Vec<RelaySimulation>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRelay {
    fn new(responses: HashMap<String, Vec<RelaySimulation>>) -> Arc<Self> {
        Arc::new(Self {
            responses,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RelayTransport for ScriptedRelay {
    async fn simulate(
        &self,
        endpoint: &str,
        keys: &[FeedKey],
        _timeout: Duration,
    ) -> Result<Vec<RelaySimulation>, EngineError> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        match self.responses.get(endpoint) {
            Some(simulations) => Ok(simulations
                .iter()
                .filter(|sim| keys.iter().any(|k| k.as_str() == sim.feed_hash))
                .cloned()
                .collect()),
            None => Err(EngineError::Rpc("endpoint down".into())),
        }
    }
}

fn sim(hash: &str, results: Vec<Option<f64>>) -> RelaySimulation {
    RelaySimulation {
        feed_hash: hash.into(),
        results,
    }
}

fn relay_requests(hashes: &[&str]) -> Vec<FeedRequest> {
    hashes
        .iter()
        .map(|hash| FeedRequest::new(FeedKey::new(*hash), SourceKind::Relay))
        .collect()
}

fn build_feed_payload(price: i64, conf: u64, exponent: i32) -> Vec<u8> {
    let mut payload = vec![0u8; 84];
    payload[32..40].copy_from_slice(&price.to_le_bytes());
    payload[40..48].copy_from_slice(&conf.to_le_bytes());
    payload[48..52].copy_from_slice(&exponent.to_le_bytes());
    payload[68..76].copy_from_slice(&price.to_le_bytes());
    payload[76..84].copy_from_slice(&conf.to_le_bytes());
    payload
}

fn bank(
    address: &str,
    tag: u16,
    weight_init: Decimal,
    weight_maint: Decimal,
    entries: Vec<EmodeEntry>,
) -> BankRecord {
    BankRecord {
        address: Address::new(address),
        group: Address::new("group"),
        mint: Address::new(format!("{address}-mint")),
        emissions_mint: None,
        oracle_key: FeedKey::new(format!("{address}-oracle")),
        oracle_source: SourceKind::OnChain,
        asset_weight_init: weight_init,
        asset_weight_maint: weight_maint,
        emode_tag: EmodeTag(tag),
        emode_entries: entries,
    }
}

fn entry(tag: u16, weight_init: Decimal, weight_maint: Decimal) -> EmodeEntry {
    EmodeEntry {
        collateral_bank_emode_tag: EmodeTag(tag),
        asset_weight_init: weight_init,
        asset_weight_maint: weight_maint,
    }
}

#[test]
fn noisy_confidence_is_capped_to_a_symmetric_band() {
    // price 100, raw confidence 50, 2% cap
    let record = decode_price_feed(&build_feed_payload(100, 50, 0), dec!(0.02)).unwrap();
    assert_eq!(record.realtime.confidence, dec!(2));
    assert_eq!(record.realtime.lowest_price, dec!(98));
    assert_eq!(record.realtime.highest_price, dec!(102));
}

#[test]
fn chunk_round_trip_preserves_the_key_set() {
    for (count, size) in [(1usize, 1usize), (5, 2), (30, 30), (31, 30), (90, 7)] {
        let keys: Vec<FeedKey> = (0..count).map(|i| FeedKey::new(format!("feed-{i}"))).collect();
        let reassembled: Vec<FeedKey> = chunks(&keys, size).into_iter().flatten().collect();
        assert_eq!(reassembled, keys, "count={count} size={size}");
    }
}

#[tokio::test]
async fn result_map_is_total_over_the_request_set() {
    // Only one of three requested relay feeds exists upstream.
    let transport = ScriptedRelay::new(HashMap::from([(
        "http://primary".to_string(),
        vec![sim("feed-a", vec![Some(10.0)])],
    )]));
    let engine = Engine::with_relay_transport(&test_config(), transport).unwrap();

    let requests = relay_requests(&["feed-a", "feed-b", "feed-c"]);
    let results = engine.get_prices(&requests).await;

    assert_eq!(results.len(), 3);
    assert!(!results[&FeedKey::new("feed-a")].is_unknown());
    assert!(results[&FeedKey::new("feed-b")].is_unknown());
    assert!(results[&FeedKey::new("feed-c")].is_unknown());
}

#[tokio::test]
async fn fallback_prices_a_chunk_after_primary_failure() {
    let transport = ScriptedRelay::new(HashMap::from([(
        "http://fallback".to_string(),
        vec![sim("feed-a", vec![Some(4.0)])],
    )]));
    let scripted: Arc<dyn RelayTransport> = transport.clone();
    let engine = Engine::with_relay_transport(&test_config(), scripted).unwrap();

    let results = engine.get_prices(&relay_requests(&["feed-a"])).await;
    let record = results[&FeedKey::new("feed-a")].as_record().expect("priced");
    assert_eq!(record.realtime.price, dec!(4));

    let calls = transport.calls.lock().unwrap();
    assert_eq!(*calls, vec!["http://primary", "http://fallback"]);
}

#[tokio::test]
async fn both_endpoints_down_yields_unknowns_not_errors() {
    let transport = ScriptedRelay::new(HashMap::new());
    let engine = Engine::with_relay_transport(&test_config(), transport).unwrap();

    let results = engine.get_prices(&relay_requests(&["feed-a", "feed-b"])).await;
    assert_eq!(results.len(), 2);
    assert!(results.values().all(PriceResult::is_unknown));
}

#[tokio::test]
async fn one_broken_feed_does_not_poison_its_chunk() {
    // Five feeds in one chunk; feed-c reports [null].
    let transport = ScriptedRelay::new(HashMap::from([(
        "http://primary".to_string(),
        vec![
            sim("feed-a", vec![Some(1.0)]),
            sim("feed-b", vec![Some(2.0)]),
            sim("feed-c", vec![None]),
            sim("feed-d", vec![Some(4.0)]),
            sim("feed-e", vec![Some(5.0)]),
        ],
    )]));
    let engine = Engine::with_relay_transport(&test_config(), transport).unwrap();

    let results = engine
        .get_prices(&relay_requests(&["feed-a", "feed-b", "feed-c", "feed-d", "feed-e"]))
        .await;

    assert!(results[&FeedKey::new("feed-c")].is_unknown());
    for hash in ["feed-a", "feed-b", "feed-d", "feed-e"] {
        assert!(!results[&FeedKey::new(hash)].is_unknown(), "{hash}");
    }
}

#[test]
fn single_pair_raises_the_collateral_weight() {
    // Bank x at 0.80 maint; liability bank y grants tag 7 collateral 0.90.
    let banks = [
        bank("x", 7, dec!(0.70), dec!(0.80), vec![]),
        bank("y", 1, dec!(0.60), dec!(0.70), vec![entry(7, dec!(0.85), dec!(0.90))]),
    ];
    let pairs = derive_emode_pairs(&banks);
    let result = adjust_bank_weights(&banks, &pairs);

    assert_eq!(
        result.adjusted[&Address::new("x")].asset_weight_maint,
        dec!(0.90)
    );
}

#[test]
fn pair_minimum_is_tracked_before_applying() {
    // A second liability bank grants tag 7 only 0.85; the minimum 0.85 still
    // beats the configured 0.80 and is applied.
    let banks = [
        bank("x", 7, dec!(0.70), dec!(0.80), vec![]),
        bank("y", 1, dec!(0.60), dec!(0.70), vec![entry(7, dec!(0.88), dec!(0.90))]),
        bank("z", 2, dec!(0.60), dec!(0.70), vec![entry(7, dec!(0.82), dec!(0.85))]),
    ];
    let pairs = derive_emode_pairs(&banks);
    let result = adjust_bank_weights(&banks, &pairs);

    assert_eq!(
        result.adjusted[&Address::new("x")].asset_weight_maint,
        dec!(0.85)
    );
}
