//! `EvmNode`: a [`NodeQueryPort`] over JSON-RPC `eth_getLogs`.
//!
//! Each query filters on the contract address and `topics[0]` = the event
//! selector, then decodes every returned log through the contract's ABI.
//! A node refusing the query for its size maps to
//! [`NodeError::TooManyResults`], which makes the search bisect the range.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::B256;
use async_trait::async_trait;
use chainsearch_core::{BlockRange, ContractInterface, EventSchema, LogEntry, NodeError, NodeQueryPort};
use chainsearch_rpc::{RpcTransport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::contract::EvmContract;

/// JSON-RPC error code some providers use for "limit exceeded".
pub const LIMIT_EXCEEDED_CODE: i64 = -32005;

/// Message fragments providers use to reject oversized `eth_getLogs` queries.
const LIMIT_MESSAGES: &[&str] = &[
    "query returned more than 10000 results",
    "response size exceeded",
    "log response size exceeded",
    "too many logs",
];

/// Throttling messages; these share `-32005` with the size limit on some providers.
const RATE_LIMIT_MESSAGES: &[&str] = &[
    "rate limit",
    "request count",
    "requests per",
    "too many requests",
    "capacity",
];

// ─── RawLog ───────────────────────────────────────────────────────────────────

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Result<u64, NodeError> {
        let raw = self
            .block_number
            .as_deref()
            .ok_or_else(|| NodeError::Decode("log has no blockNumber (pending?)".into()))?;
        parse_hex_u64(raw)
    }

    pub fn topic_words(&self) -> Result<Vec<B256>, NodeError> {
        self.topics
            .iter()
            .map(|t| {
                t.parse::<B256>()
                    .map_err(|e| NodeError::Decode(format!("invalid topic '{t}': {e}")))
            })
            .collect()
    }

    pub fn data_bytes(&self) -> Result<Vec<u8>, NodeError> {
        let hex_str = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(hex_str).map_err(|e| NodeError::Decode(format!("invalid log data: {e}")))
    }
}

/// Parse a hex quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Result<u64, NodeError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| NodeError::Decode(format!("invalid hex quantity '{s}': {e}")))
}

/// `true` if a node error signals that the result set was too large.
///
/// `-32005` alone is not enough: it also carries rate limiting, so the
/// message must talk about results or logs.
pub fn is_result_limit(code: Option<i64>, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    if RATE_LIMIT_MESSAGES.iter().any(|m| message.contains(m)) {
        return false;
    }
    if LIMIT_MESSAGES.iter().any(|m| message.contains(m)) {
        return true;
    }
    code == Some(LIMIT_EXCEEDED_CODE) && (message.contains("results") || message.contains("logs"))
}

// ─── EvmNode ──────────────────────────────────────────────────────────────────

/// Event-log source backed by any [`RpcTransport`].
pub struct EvmNode<T> {
    transport: T,
    contract: Arc<EvmContract>,
    next_id: AtomicU64,
}

impl<T: RpcTransport> EvmNode<T> {
    pub fn new(transport: T, contract: Arc<EvmContract>) -> Self {
        Self {
            transport,
            contract,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn contract(&self) -> &Arc<EvmContract> {
        &self.contract
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn classify(&self, err: TransportError, range: BlockRange) -> NodeError {
        match err {
            TransportError::Rpc(e) if is_result_limit(Some(e.code), &e.message) => {
                NodeError::TooManyResults {
                    start: range.start(),
                    end: range.end(),
                }
            }
            TransportError::Status { ref body, .. } if is_result_limit(None, body) => {
                NodeError::TooManyResults {
                    start: range.start(),
                    end: range.end(),
                }
            }
            TransportError::Rpc(e) => NodeError::Rpc(e.to_string()),
            TransportError::Deserialization(e) => NodeError::Decode(e.to_string()),
            other => NodeError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl<T: RpcTransport> NodeQueryPort for EvmNode<T> {
    async fn query(
        &self,
        event: &EventSchema,
        range: BlockRange,
    ) -> Result<Vec<LogEntry>, NodeError> {
        let decoder = self.contract.decoder(&event.id).ok_or_else(|| {
            NodeError::Decode(format!("event '{}' is not part of the contract ABI", event.name))
        })?;

        let filter = json!({
            "address": self.contract.address(),
            "topics": [event.id],
            "fromBlock": format!("{:#x}", range.start()),
            "toBlock": format!("{:#x}", range.end()),
        });
        let logs: Vec<RawLog> = self
            .transport
            .call(self.id(), "eth_getLogs", vec![filter])
            .await
            .map_err(|e| self.classify(e, range))?;

        let mut entries = Vec::with_capacity(logs.len());
        for log in logs.iter().filter(|l| !l.removed) {
            let entry = decoder.decode(
                log.block_number_u64()?,
                &log.topic_words()?,
                &log.data_bytes()?,
            )?;
            entries.push(entry);
        }
        tracing::trace!(
            event = %event.name,
            range = %range,
            raw = logs.len(),
            decoded = entries.len(),
            "eth_getLogs answered"
        );
        Ok(entries)
    }

    async fn latest_block(&self) -> Result<u64, NodeError> {
        let head: String = self
            .transport
            .call(self.id(), "eth_blockNumber", vec![])
            .await
            .map_err(|e| match e {
                TransportError::Rpc(e) => NodeError::Rpc(e.to_string()),
                TransportError::Deserialization(e) => NodeError::Decode(e.to_string()),
                other => NodeError::Transport(other.to_string()),
            })?;
        parse_hex_u64(&head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsearch_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

    #[test]
    fn hex_quantities() {
        assert_eq!(parse_hex_u64("0x10").unwrap(), 16);
        assert_eq!(parse_hex_u64("ff").unwrap(), 255);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn limit_detection() {
        assert!(is_result_limit(
            Some(-32005),
            "query returned more than 10000 results. Try with this block range [0x1, 0x2]."
        ));
        assert!(is_result_limit(Some(-32005), "limit exceeded: too many results"));
        assert!(is_result_limit(None, "Log response size exceeded."));
        assert!(!is_result_limit(Some(-32000), "execution reverted"));
        assert!(!is_result_limit(Some(-32005), "limit exceeded"));
    }

    #[test]
    fn rate_limits_are_not_result_limits() {
        assert!(!is_result_limit(
            Some(-32005),
            "daily request count exceeded, request rate limited"
        ));
        assert!(!is_result_limit(Some(-32005), "project ID request rate exceeded"));
        assert!(!is_result_limit(None, "Too Many Requests"));
    }

    struct Unused;

    #[async_trait]
    impl RpcTransport for Unused {
        async fn send(&self, _req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            unreachable!("tests call classify directly")
        }

        fn url(&self) -> &str {
            "test://unused"
        }
    }

    #[test]
    fn classify_separates_limit_from_other_node_errors() {
        let contract = EvmContract::new(
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            crate::contract::ERC20_ABI,
        )
        .unwrap();
        let node = EvmNode::new(Unused, Arc::new(contract));
        let range = BlockRange::new(10, 20).unwrap();
        let rpc = |code: i64, message: &str| {
            TransportError::Rpc(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            })
        };

        let limit = node.classify(rpc(-32005, "query returned more than 10000 results"), range);
        assert!(matches!(limit, NodeError::TooManyResults { start: 10, end: 20 }));

        let throttled = node.classify(
            rpc(-32005, "daily request count exceeded, request rate limited"),
            range,
        );
        assert!(matches!(throttled, NodeError::Rpc(_)), "{throttled}");

        let oversized = node.classify(
            TransportError::Status {
                status: 413,
                body: "log response size exceeded".into(),
            },
            range,
        );
        assert!(oversized.is_too_many_results());
    }

    #[test]
    fn raw_log_parses_node_json() {
        let raw = r#"{
            "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
            "data": "0x",
            "blockNumber": "0x1b4",
            "transactionHash": "0x00",
            "logIndex": "0x0",
            "removed": false
        }"#;
        let log: RawLog = serde_json::from_str(raw).unwrap();
        assert_eq!(log.block_number_u64().unwrap(), 436);
        assert_eq!(log.topic_words().unwrap().len(), 1);
        assert!(log.data_bytes().unwrap().is_empty());
        assert!(!log.removed);
    }
}
