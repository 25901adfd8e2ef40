//! chainsearch-rpc: JSON-RPC plumbing for talking to EVM nodes.
//!
//! [`RpcTransport`] is the seam; [`HttpRpcClient`] is the reqwest-backed
//! implementation with exponential backoff on transient failures.

pub mod error;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::RpcTransport;
