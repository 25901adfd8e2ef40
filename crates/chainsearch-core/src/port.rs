//! Collaborator traits: the node the logs come from and the contract
//! interface that enumerates which events to fetch.

use async_trait::async_trait;

use crate::error::NodeError;
use crate::types::{BlockRange, EventSchema, LogEntry};

/// Trait for querying event logs from a blockchain node.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; a single instance is shared by
/// every batch task of a search.
#[async_trait]
pub trait NodeQueryPort: Send + Sync {
    /// Return every decoded log of `event` within `range`.
    ///
    /// Must fail with [`NodeError::TooManyResults`] when the node rejects the
    /// query for exceeding its result-size limit; all other failures map to
    /// the remaining variants.
    async fn query(
        &self,
        event: &EventSchema,
        range: BlockRange,
    ) -> Result<Vec<LogEntry>, NodeError>;

    /// The node's latest block height.
    async fn latest_block(&self) -> Result<u64, NodeError>;
}

/// A resolved contract: its address and the events its ABI declares.
pub trait ContractInterface: Send + Sync {
    /// Checksummed contract address.
    fn address(&self) -> &str;

    /// Events in ABI declaration order.
    fn events(&self) -> &[EventSchema];
}

/// A contract interface built from an explicit event list.
#[derive(Debug, Clone)]
pub struct StaticContract {
    address: String,
    events: Vec<EventSchema>,
}

impl StaticContract {
    pub fn new(address: impl Into<String>, events: Vec<EventSchema>) -> Self {
        Self {
            address: address.into(),
            events,
        }
    }
}

impl ContractInterface for StaticContract {
    fn address(&self) -> &str {
        &self.address
    }

    fn events(&self) -> &[EventSchema] {
        &self.events
    }
}
