//! chainsearch-evm: EVM adapter for the chainsearch engine.
//!
//! - [`ContractModel`] / [`Erc20Contract`] / [`GenericContract`]: where the ABI comes from
//! - [`EvmContract`]: checksummed address + per-event decoders
//! - [`EvmNode`]: `eth_getLogs` / `eth_blockNumber` over any [`RpcTransport`](chainsearch_rpc::RpcTransport)
//! - [`SearchBuilder`]: wires it all into a [`Search`](chainsearch_core::Search)

pub mod abi;
pub mod builder;
pub mod contract;
pub mod node;
pub mod normalizer;

pub use abi::{parse_events, EventDecoder};
pub use builder::SearchBuilder;
pub use contract::{checksum_address, ContractModel, Erc20Contract, EvmContract, GenericContract, ERC20_ABI};
pub use node::{is_result_limit, parse_hex_u64, EvmNode, RawLog};
