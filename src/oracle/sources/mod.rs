//! Per-source fetch adapters
//!
//! One adapter per upstream strategy. Each adapter takes the feed keys routed
//! to it and returns a result map over exactly those keys; upstream failures
//! degrade to `PriceResult::Unknown` with a warn log rather than failing the
//! whole fetch.

mod aggregator;
mod onchain;
mod relay;

pub use aggregator::AggregatorSource;
pub use onchain::OnChainSource;
pub use relay::{HttpRelayTransport, RelaySimulation, RelaySource, RelayTransport};
