//! Contract models and the resolved EVM contract interface.
//!
//! A [`ContractModel`] is the user-facing description of a contract: an
//! optional address plus a way to obtain its ABI. [`EvmContract`] is what a
//! search actually runs against: a checksummed address and one decoder per
//! ABI event.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use alloy_primitives::Address;
use chainsearch_core::{ContractInterface, EventSchema, SearchError};

use crate::abi::{self, EventDecoder};

/// ABI bundled with [`Erc20Contract`].
pub const ERC20_ABI: &str = include_str!("../abis/erc20.json");

// ─── ContractModel ────────────────────────────────────────────────────────────

/// A contract description that can supply an ABI.
pub trait ContractModel: Send + Sync {
    /// Human-readable model name, used in error messages.
    fn name(&self) -> &str;

    /// The deployed address, if the model carries one.
    fn address(&self) -> Option<&str>;

    /// The ABI as a JSON string.
    fn abi(&self) -> Result<String, SearchError>;
}

/// A contract given by an explicit ABI.
#[derive(Debug, Clone)]
pub struct GenericContract {
    address: Option<String>,
    abi: String,
}

impl GenericContract {
    pub fn new(address: impl Into<String>, abi: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            abi: abi.into(),
        }
    }

    /// An ABI with no address attached; the address must be supplied at build time.
    pub fn from_abi(abi: impl Into<String>) -> Self {
        Self {
            address: None,
            abi: abi.into(),
        }
    }
}

impl ContractModel for GenericContract {
    fn name(&self) -> &str {
        "generic"
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn abi(&self) -> Result<String, SearchError> {
        Ok(self.abi.clone())
    }
}

/// Any ERC-20 token. Uses the bundled ABI unless overridden.
#[derive(Debug, Clone, Default)]
pub struct Erc20Contract {
    address: Option<String>,
    abi: Option<String>,
    template: Option<PathBuf>,
}

impl Erc20Contract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    /// Use `abi` instead of the template.
    pub fn with_abi(mut self, abi: impl Into<String>) -> Self {
        self.abi = Some(abi.into());
        self
    }

    /// Read the template from `path` instead of the bundled copy.
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = Some(path.into());
        self
    }
}

impl ContractModel for Erc20Contract {
    fn name(&self) -> &str {
        "erc20"
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn abi(&self) -> Result<String, SearchError> {
        if let Some(abi) = &self.abi {
            return Ok(abi.clone());
        }
        match &self.template {
            None => Ok(ERC20_ABI.to_string()),
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                tracing::error!(model = self.name(), path = %path.display(), error = %e, "ABI template unreadable");
                SearchError::NoAbiResolved {
                    name: path.display().to_string(),
                }
            }),
        }
    }
}

// ─── EvmContract ──────────────────────────────────────────────────────────────

/// A resolved contract: checksummed address plus per-event decoders.
#[derive(Debug, Clone)]
pub struct EvmContract {
    address: String,
    events: Vec<EventSchema>,
    decoders: HashMap<String, EventDecoder>,
}

impl EvmContract {
    /// Resolve `address` and `abi_json` into a contract interface.
    pub fn new(address: &str, abi_json: &str) -> Result<Self, SearchError> {
        let address = checksum_address(address)?;
        let parsed = abi::parse_events(abi_json)?;

        let events = parsed.iter().map(|d| d.schema().clone()).collect();
        let decoders = parsed
            .into_iter()
            .map(|d| (d.schema().id.clone(), d))
            .collect();
        Ok(Self {
            address,
            events,
            decoders,
        })
    }

    /// Resolve a model. The model's own address wins over `address`.
    pub fn from_model(model: &dyn ContractModel, address: Option<&str>) -> Result<Self, SearchError> {
        let address = model.address().or(address).ok_or_else(|| {
            SearchError::InvalidContract(format!(
                "contract model '{}' has no address and none was supplied",
                model.name()
            ))
        })?;
        Self::new(address, &model.abi()?)
    }

    /// The decoder for the event whose selector is `id`.
    pub fn decoder(&self, id: &str) -> Option<&EventDecoder> {
        self.decoders.get(id)
    }
}

impl ContractInterface for EvmContract {
    fn address(&self) -> &str {
        &self.address
    }

    fn events(&self) -> &[EventSchema] {
        &self.events
    }
}

/// Parse a hex address and return its EIP-55 checksummed form.
pub fn checksum_address(address: &str) -> Result<String, SearchError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(SearchError::InvalidContract("address is empty".into()));
    }
    Address::from_str(trimmed)
        .map(|a| a.to_checksum(None))
        .map_err(|e| SearchError::InvalidContract(format!("invalid address '{trimmed}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    #[test]
    fn address_is_checksummed() {
        assert_eq!(
            checksum_address(USDC).unwrap(),
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        );
        assert!(checksum_address("").is_err());
        assert!(checksum_address("0x1234").is_err());
    }

    #[test]
    fn erc20_uses_bundled_template() {
        let contract = EvmContract::from_model(&Erc20Contract::at(USDC), None).unwrap();
        let names: Vec<_> = contract.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Approval", "Transfer"]);
        assert!(contract
            .decoder("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
            .is_some());
    }

    #[test]
    fn missing_template_is_no_abi_resolved() {
        let model = Erc20Contract::at(USDC).with_template_path("/nonexistent/erc20abi.json");
        let err = EvmContract::from_model(&model, None).unwrap_err();
        assert!(matches!(err, SearchError::NoAbiResolved { .. }), "{err}");
    }

    #[test]
    fn explicit_abi_overrides_template() {
        let abi = r#"[{"type":"event","name":"Ping","anonymous":false,"inputs":[]}]"#;
        let model = Erc20Contract::new()
            .with_abi(abi)
            .with_template_path("/nonexistent/erc20abi.json");
        let contract = EvmContract::from_model(&model, Some(USDC)).unwrap();
        assert_eq!(contract.events().len(), 1);
        assert_eq!(contract.events()[0].name, "Ping");
    }

    #[test]
    fn model_without_any_address_is_rejected() {
        let err = EvmContract::from_model(&Erc20Contract::new(), None).unwrap_err();
        assert!(matches!(err, SearchError::InvalidContract(_)), "{err}");
    }

    #[test]
    fn model_address_takes_precedence() {
        let other = "0x0000000000000000000000000000000000000001";
        let contract = EvmContract::from_model(&Erc20Contract::at(USDC), Some(other)).unwrap();
        assert_eq!(contract.address(), "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    }
}
