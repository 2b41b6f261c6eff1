//! JSON-RPC account reads
//!
//! Bulk account retrieval with explicit ordering guarantees. Downstream code
//! positionally joins request and response lists, so the chunking here is the
//! single place the order contract lives: output index i always corresponds
//! to input address i, across chunk boundaries. Batch-read APIs do not return
//! addresses, so order cannot be re-derived after the fact.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;

use crate::config::RpcConfig;
use crate::errors::EngineError;
use crate::types::Address;

/// Split `items` into consecutive chunks of at most `size` elements.
///
/// Concatenating the chunks in order reproduces the input exactly; no
/// reordering, duplication, or omission. `size` must be > 0.
pub fn chunks<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    assert!(size > 0, "chunk size must be positive");
    items.chunks(size).map(|chunk| chunk.to_vec()).collect()
}

/// One raw account as returned by a bulk read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub owner: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MultipleAccountsResult {
    value: Vec<Option<WireAccount>>,
}

#[derive(Debug, Deserialize)]
struct WireAccount {
    owner: String,
    /// `[payload, encoding]` pair; only base64 is requested.
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct ProgramAccount {
    pubkey: String,
    account: WireAccount,
}

impl WireAccount {
    fn into_raw(self) -> Result<RawAccount, EngineError> {
        let bytes = general_purpose::STANDARD
            .decode(self.data.0.as_bytes())
            .map_err(|e| EngineError::Rpc(format!("invalid base64 account data: {e}")))?;
        Ok(RawAccount {
            owner: Address::new(self.owner),
            data: bytes,
        })
    }
}

/// Thin JSON-RPC client for the account-read endpoints the engine needs.
pub struct RpcClient {
    client: reqwest::Client,
    endpoint: String,
    max_accounts_per_request: usize,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_accounts_per_request: config.max_accounts_per_request.max(1),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, EngineError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::Rpc(format!(
                "{} returned status {}",
                method,
                response.status()
            )));
        }

        let parsed: RpcResponse<T> = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(EngineError::Rpc(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }
        parsed
            .result
            .ok_or_else(|| EngineError::Rpc(format!("{method} returned no result")))
    }

    /// Ordered bulk account read. The result has exactly one entry per input
    /// address, in input order; unknown accounts come back as `None`.
    ///
    /// Chunk requests run concurrently; order is restored by chunk index, not
    /// by inspecting the responses.
    pub async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<RawAccount>>, EngineError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let address_chunks = chunks(addresses, self.max_accounts_per_request);
        let requests = address_chunks.iter().map(|chunk| {
            let keys: Vec<&str> = chunk.iter().map(|a| a.as_str()).collect();
            let params = json!([keys, { "encoding": "base64" }]);
            self.call::<MultipleAccountsResult>("getMultipleAccounts", params)
        });

        // join_all yields results in future order, which is chunk order.
        let mut accounts = Vec::with_capacity(addresses.len());
        for (index, result) in join_all(requests).await.into_iter().enumerate() {
            let chunk_result = result?;
            if chunk_result.value.len() != address_chunks[index].len() {
                return Err(EngineError::Rpc(format!(
                    "getMultipleAccounts chunk {index}: requested {} accounts, got {}",
                    address_chunks[index].len(),
                    chunk_result.value.len()
                )));
            }
            for wire in chunk_result.value {
                accounts.push(wire.map(WireAccount::into_raw).transpose()?);
            }
        }

        tracing::debug!(
            requested = addresses.len(),
            chunks = address_chunks.len(),
            "bulk account read complete"
        );
        Ok(accounts)
    }

    /// Filtered program scan: all accounts owned by `program` whose payload
    /// matches `filter_bytes` at `offset` (hex-encoded comparison).
    pub async fn get_program_accounts(
        &self,
        program: &Address,
        offset: usize,
        filter_bytes: &str,
    ) -> Result<Vec<(Address, RawAccount)>, EngineError> {
        let params = json!([
            program.as_str(),
            {
                "encoding": "base64",
                "filters": [
                    { "memcmp": { "offset": offset, "bytes": filter_bytes } }
                ]
            }
        ]);

        let result: Vec<ProgramAccount> = self.call("getProgramAccounts", params).await?;
        result
            .into_iter()
            .map(|entry| {
                let address = Address::new(entry.pubkey);
                Ok((address, entry.account.into_raw()?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_preserves_order_and_content() {
        for (len, size) in [(0usize, 3usize), (1, 1), (7, 3), (9, 3), (4, 10)] {
            let items: Vec<usize> = (0..len).collect();
            let parts = chunks(&items, size);

            let reassembled: Vec<usize> = parts.iter().flatten().copied().collect();
            assert_eq!(reassembled, items, "len={len} size={size}");
            for part in &parts {
                assert!(!part.is_empty());
                assert!(part.len() <= size);
            }
        }
    }

    #[test]
    fn only_last_chunk_may_be_short() {
        let items: Vec<u8> = (0..10).collect();
        let parts = chunks(&items, 4);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[1].len(), 4);
        assert_eq!(parts[2].len(), 2);
    }

    #[test]
    #[should_panic(expected = "chunk size must be positive")]
    fn zero_chunk_size_panics() {
        chunks(&[1, 2, 3], 0);
    }

    #[test]
    fn wire_account_decodes_base64_payload() {
        let wire = WireAccount {
            owner: "aa".repeat(32),
            data: (general_purpose::STANDARD.encode([1u8, 2, 3]), "base64".into()),
        };
        let raw = wire.into_raw().unwrap();
        assert_eq!(raw.data, vec![1, 2, 3]);
        assert_eq!(raw.owner, Address::new("aa".repeat(32)));
    }

    #[test]
    fn invalid_base64_is_an_rpc_error() {
        let wire = WireAccount {
            owner: "aa".repeat(32),
            data: ("!!not-base64!!".into(), "base64".into()),
        };
        assert!(matches!(wire.into_raw(), Err(EngineError::Rpc(_))));
    }
}
