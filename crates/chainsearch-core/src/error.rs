//! Error types for the search pipeline.

use thiserror::Error;

/// Errors reported by a [`NodeQueryPort`](crate::port::NodeQueryPort).
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node refused to answer because the result set exceeds its limit.
    /// Recoverable: the fetcher bisects the range and asks again.
    #[error("Query for blocks {start}..={end} returned too many results")]
    TooManyResults { start: u64, end: u64 },

    /// JSON-RPC error returned by the node.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Connection / HTTP / timeout failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered but the payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl NodeError {
    /// Returns `true` if this is the result-size limit signal.
    pub fn is_too_many_results(&self) -> bool {
        matches!(self, Self::TooManyResults { .. })
    }
}

/// Errors that abort a search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Conflicting or out-of-bounds arguments, or invalid configuration.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A range at the minimum width still exceeds the node's result limit.
    #[error("Range {start}..={end} still returns too many results and cannot be split further")]
    RangeNotReducible { start: u64, end: u64 },

    /// Any non-recoverable node failure, propagated unchanged.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// The contract's ABI could not be resolved (e.g. missing template).
    #[error("No ABI resolved for '{name}'")]
    NoAbiResolved { name: String },

    /// Missing or malformed contract address / ABI.
    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    /// A worker task panicked or was cancelled.
    #[error("Batch task failed: {0}")]
    Task(String),
}

impl SearchError {
    /// Returns `true` for errors caused by the caller's arguments.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_error_converts_into_search_error() {
        let err: SearchError = NodeError::Rpc("execution reverted".into()).into();
        assert!(matches!(err, SearchError::Node(NodeError::Rpc(_))));
        assert_eq!(err.to_string(), "RPC error: execution reverted");
    }

    #[test]
    fn too_many_results_is_distinguished() {
        assert!(NodeError::TooManyResults { start: 1, end: 2 }.is_too_many_results());
        assert!(!NodeError::Transport("timeout".into()).is_too_many_results());
    }
}
