//! Fluent builder for an EVM-backed [`Search`].
//!
//! # Example
//!
//! ```rust,no_run
//! use chainsearch_core::EventsRequest;
//! use chainsearch_evm::{Erc20Contract, SearchBuilder};
//!
//! # async fn run() -> Result<(), chainsearch_core::SearchError> {
//! let search = SearchBuilder::new()
//!     .rpc_url("https://mainnet.example.org")
//!     .contract_model(Erc20Contract::at("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
//!     .batches(20)
//!     .build()?;
//! let events = search.get_events(EventsRequest::new().n_blocks_ago(5_000)).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chainsearch_core::{NodeError, Search, SearchConfig, SearchError};
use chainsearch_rpc::{HttpClientConfig, HttpRpcClient, RpcTransport};

use crate::contract::{ContractModel, EvmContract};
use crate::node::EvmNode;

/// Fluent builder for [`Search`] over an EVM JSON-RPC endpoint.
#[derive(Default)]
pub struct SearchBuilder {
    rpc_url: Option<String>,
    http: HttpClientConfig,
    address: Option<String>,
    abi: Option<String>,
    model: Option<Box<dyn ContractModel>>,
    config: SearchConfig,
}

impl SearchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON-RPC endpoint URL.
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// HTTP timeout and retry settings.
    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http = config;
        self
    }

    /// Contract address. Required unless the contract model carries one.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Contract ABI as JSON. Ignored when a contract model is set.
    pub fn abi(mut self, abi: impl Into<String>) -> Self {
        self.abi = Some(abi.into());
        self
    }

    pub fn contract_model(mut self, model: impl ContractModel + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn batches(mut self, batches: usize) -> Self {
        self.config.batches = batches;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Resolve the contract: address + ABI, or a model with (or alongside) an address.
    pub fn resolve_contract(&self) -> Result<EvmContract, SearchError> {
        match &self.model {
            Some(model) => EvmContract::from_model(model.as_ref(), self.address.as_deref()),
            None => match (&self.address, &self.abi) {
                (Some(address), Some(abi)) => EvmContract::new(address, abi),
                _ => Err(SearchError::InvalidContract(
                    "address and abi, or a contract model with an address, must be given".into(),
                )),
            },
        }
    }

    /// Build a search over HTTP JSON-RPC.
    pub fn build(self) -> Result<Search, SearchError> {
        let url = self
            .rpc_url
            .clone()
            .ok_or_else(|| SearchError::InvalidRequest("an RPC URL is required".into()))?;
        let client = HttpRpcClient::new(url, self.http.clone())
            .map_err(|e| SearchError::Node(NodeError::Transport(e.to_string())))?;
        self.build_with_transport(client)
    }

    /// Build a search over a caller-supplied transport.
    pub fn build_with_transport<T: RpcTransport>(self, transport: T) -> Result<Search, SearchError> {
        let contract = Arc::new(self.resolve_contract()?);
        tracing::debug!(
            address = %chainsearch_core::ContractInterface::address(contract.as_ref()),
            url = %transport.url(),
            "search built"
        );
        let node = Arc::new(EvmNode::new(transport, Arc::clone(&contract)));
        Search::new(node, contract, self.config)
    }
}
