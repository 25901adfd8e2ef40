//! Event extraction from a JSON ABI and log decoding.
//!
//! # EVM log layout
//! - `topics[0]` is the event selector (`keccak256` of the signature)
//! - `topics[1..]` hold the indexed arguments, one 32-byte word each
//! - `data` holds the non-indexed arguments, ABI-encoded as a sequence
//!
//! Indexed reference types (string, bytes, arrays, tuples) are stored as the
//! hash of their encoding; the original value is unrecoverable, so the raw
//! 32-byte topic is returned instead.

use std::collections::HashMap;

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::B256;
use chainsearch_core::{EventSchema, FieldValue, LogEntry, NodeError, SearchError};
use serde_json::Value;

use crate::normalizer;

// ─── EventDecoder ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    ty: DynSolType,
    indexed: bool,
}

/// Decodes raw logs of one ABI event into [`LogEntry`] values.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    schema: EventSchema,
    selector: B256,
    params: Vec<ParamSpec>,
}

impl EventDecoder {
    /// Build a decoder for `event`, published under `name`.
    pub fn new(event: &Event, name: impl Into<String>) -> Result<Self, SearchError> {
        let mut params = Vec::with_capacity(event.inputs.len());
        for (i, input) in event.inputs.iter().enumerate() {
            let ty: DynSolType = input.resolve().map_err(|e| {
                SearchError::InvalidContract(format!(
                    "event {}: cannot resolve type '{}': {e}",
                    event.name, input.ty
                ))
            })?;
            let name = if input.name.is_empty() {
                format!("arg{i}")
            } else {
                input.name.clone()
            };
            params.push(ParamSpec {
                name,
                ty,
                indexed: input.indexed,
            });
        }

        let selector = event.selector();
        let schema = EventSchema::new(
            name,
            format!("{selector:#x}"),
            params.iter().map(|p| p.name.clone()),
        );
        Ok(Self {
            schema,
            selector,
            params,
        })
    }

    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    pub fn selector(&self) -> B256 {
        self.selector
    }

    /// Decode one log. Fields come out in ABI argument order.
    pub fn decode(
        &self,
        block_number: u64,
        topics: &[B256],
        data: &[u8],
    ) -> Result<LogEntry, NodeError> {
        let (first, indexed_topics) = topics
            .split_first()
            .ok_or_else(|| self.error("log has no topics"))?;
        if *first != self.selector {
            return Err(self.error(&format!("unexpected topic0 {first:#x}")));
        }

        let indexed_count = self.params.iter().filter(|p| p.indexed).count();
        if indexed_topics.len() != indexed_count {
            return Err(self.error(&format!(
                "expected {indexed_count} indexed topics, got {}",
                indexed_topics.len()
            )));
        }

        let mut body = self.decode_data(data)?.into_iter();
        let mut topics = indexed_topics.iter();
        let mut entry = LogEntry::new(block_number);

        for param in &self.params {
            let value = if param.indexed {
                let topic = topics
                    .next()
                    .ok_or_else(|| self.error("missing indexed topic"))?;
                self.decode_topic(topic, &param.ty)?
            } else {
                body.next()
                    .map(normalizer::normalize)
                    .ok_or_else(|| self.error(&format!("missing data value '{}'", param.name)))?
            };
            entry.fields.insert(param.name.clone(), value);
        }
        Ok(entry)
    }

    fn decode_topic(&self, topic: &B256, ty: &DynSolType) -> Result<FieldValue, NodeError> {
        match ty {
            DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_) => Ok(FieldValue::Bytes(topic.to_vec())),
            _ => ty
                .abi_decode(topic.as_slice())
                .map(normalizer::normalize)
                .map_err(|e| self.error(&format!("topic decode: {e}"))),
        }
    }

    fn decode_data(&self, data: &[u8]) -> Result<Vec<DynSolValue>, NodeError> {
        let types: Vec<DynSolType> = self
            .params
            .iter()
            .filter(|p| !p.indexed)
            .map(|p| p.ty.clone())
            .collect();
        if types.is_empty() {
            return Ok(vec![]);
        }

        let decoded = DynSolType::Tuple(types)
            .abi_decode_sequence(data)
            .map_err(|e| self.error(&format!("data decode: {e}")))?;
        Ok(match decoded {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        })
    }

    fn error(&self, reason: &str) -> NodeError {
        NodeError::Decode(format!("{}: {reason}", self.schema.name))
    }
}

// ─── ABI parsing ──────────────────────────────────────────────────────────────

/// Parse a JSON ABI and return one decoder per non-anonymous event, in
/// declaration order.
///
/// Accepts either a bare ABI array or a compiler artifact object with an
/// `abi` field. An overloaded event name is published under its full
/// signature after its first occurrence, keeping event names unique.
pub fn parse_events(abi_json: &str) -> Result<Vec<EventDecoder>, SearchError> {
    let value: Value = serde_json::from_str(abi_json)
        .map_err(|e| SearchError::InvalidContract(format!("ABI is not valid JSON: {e}")))?;
    let items = match value {
        Value::Object(mut obj) => obj
            .remove("abi")
            .ok_or_else(|| SearchError::InvalidContract("ABI object has no 'abi' field".into()))?,
        other => other,
    };
    let abi: JsonAbi = serde_json::from_value(items.clone())
        .map_err(|e| SearchError::InvalidContract(format!("malformed ABI: {e}")))?;

    // `JsonAbi` groups events by name; walk the raw items to keep ABI order.
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut decoders = Vec::new();
    for item in items.as_array().into_iter().flatten() {
        if item.get("type").and_then(Value::as_str) != Some("event") {
            continue;
        }
        let Some(name) = item.get("name").and_then(Value::as_str) else {
            continue;
        };
        let occurrence = seen.entry(name).or_insert(0);
        let Some(event) = abi.events.get(name).and_then(|v| v.get(*occurrence)) else {
            continue;
        };
        let published = if *occurrence == 0 {
            event.name.clone()
        } else {
            event.signature()
        };
        *occurrence += 1;

        if event.anonymous {
            tracing::debug!(event = %event.name, "skipping anonymous event");
            continue;
        }
        decoders.push(EventDecoder::new(event, published)?);
    }
    Ok(decoders)
}
