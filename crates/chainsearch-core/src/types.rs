//! Shared types for the search pipeline.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::SearchError;

/// Name of the column every dataset carries in front of the event arguments.
pub const BLOCK_NUMBER_COLUMN: &str = "block_number";

// ─── BlockRange ───────────────────────────────────────────────────────────────

/// An inclusive range of block heights, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    start: u64,
    end: u64,
}

impl BlockRange {
    /// Create a range; fails if `end < start`.
    pub fn new(start: u64, end: u64) -> Result<Self, SearchError> {
        if end < start {
            return Err(SearchError::InvalidRequest(format!(
                "block range end {end} is below start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one block.
    pub fn single(block: u64) -> Self {
        Self {
            start: block,
            end: block,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of blocks in the range (always ≥ 1). Saturates at `u64::MAX`
    /// for the full `0..=u64::MAX` span.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// A range is never empty; provided for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }

    /// Split at the floor midpoint into `start..=mid` and `mid+1..=end`.
    ///
    /// Returns `None` for a single-block range.
    pub fn bisect(&self) -> Option<(BlockRange, BlockRange)> {
        if self.start == self.end {
            return None;
        }
        let mid = self.start + (self.end - self.start) / 2;
        Some((
            BlockRange {
                start: self.start,
                end: mid,
            },
            BlockRange {
                start: mid + 1,
                end: self.end,
            },
        ))
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ─── EventSchema / EventQuery ────────────────────────────────────────────────

/// One event exposed by a contract interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSchema {
    /// Event name, unique per contract ABI (e.g. `"Transfer"`).
    pub name: String,
    /// Node-side identifier used to filter logs (EVM: the `topic0` selector).
    pub id: String,
    /// Argument names in ABI order.
    pub arguments: Vec<String>,
}

impl EventSchema {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        arguments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    /// Dataset columns: `block_number` followed by the arguments.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(BLOCK_NUMBER_COLUMN.to_string())
            .chain(self.arguments.iter().cloned())
            .collect()
    }
}

/// A unit of work submitted to the node.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub event: Arc<EventSchema>,
    pub range: BlockRange,
}

impl EventQuery {
    pub fn new(event: Arc<EventSchema>, range: BlockRange) -> Self {
        Self { event, range }
    }

    /// The same event over a different range.
    pub fn with_range(&self, range: BlockRange) -> Self {
        Self {
            event: Arc::clone(&self.event),
            range,
        }
    }
}

// ─── FieldValue ──────────────────────────────────────────────────────────────

/// A decoded event argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Uint(u128),
    /// Unsigned integers wider than 128 bits, as a decimal string.
    BigUint(String),
    Int(i128),
    /// Signed integers wider than 128 bits, as a decimal string.
    BigInt(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    /// EIP-55 checksummed address.
    Address(String),
    Array(Vec<FieldValue>),
    Tuple(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Uint(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::BigUint(s) | FieldValue::BigInt(s) => write!(f, "{s}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Bytes(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            FieldValue::Str(s) | FieldValue::Address(s) => write!(f, "{s}"),
            FieldValue::Array(items) | FieldValue::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            FieldValue::Null => write!(f, "null"),
        }
    }
}

// ─── LogEntry / Row ──────────────────────────────────────────────────────────

/// A decoded log entry as produced by the node collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub block_number: u64,
    /// Named argument values in ABI order.
    pub fields: IndexMap<String, FieldValue>,
}

impl LogEntry {
    pub fn new(block_number: u64) -> Self {
        Self {
            block_number,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// One dataset row: `block_number` ∪ the entry's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub block_number: u64,
    pub fields: IndexMap<String, FieldValue>,
}

impl Row {
    /// Look up a column, including the synthetic `block_number` column.
    pub fn get(&self, column: &str) -> Option<FieldValue> {
        if column == BLOCK_NUMBER_COLUMN {
            return Some(FieldValue::Uint(self.block_number as u128));
        }
        self.fields.get(column).cloned()
    }
}

impl From<LogEntry> for Row {
    fn from(entry: LogEntry) -> Self {
        Self {
            block_number: entry.block_number,
            fields: entry.fields,
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(BLOCK_NUMBER_COLUMN, &self.block_number)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ─── Fragment ────────────────────────────────────────────────────────────────

/// The rows produced by fetching one batch (or one bisected sub-batch).
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// The node matched nothing in this range.
    NoData,
    Rows(Vec<Row>),
}

impl Fragment {
    /// Map raw entries into a fragment; no entries yields [`Fragment::NoData`].
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        if entries.is_empty() {
            return Fragment::NoData;
        }
        Fragment::Rows(entries.into_iter().map(Row::from).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Fragment::NoData => 0,
            Fragment::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `other` after `self`, keeping `NoData` only if both are empty.
    pub fn concat(self, other: Fragment) -> Fragment {
        match (self, other) {
            (Fragment::NoData, other) => other,
            (this, Fragment::NoData) => this,
            (Fragment::Rows(mut low), Fragment::Rows(high)) => {
                low.extend(high);
                Fragment::Rows(low)
            }
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Fragment::NoData => Vec::new(),
            Fragment::Rows(rows) => rows,
        }
    }
}

// ─── EventDataset / ResultMap ────────────────────────────────────────────────

/// All rows for one event type, ascending by block number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDataset {
    pub event: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl EventDataset {
    /// An empty dataset carrying the event's column schema.
    pub fn empty(schema: &EventSchema) -> Self {
        Self {
            event: schema.name.clone(),
            columns: schema.columns(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn block_numbers(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.block_number).collect()
    }

    /// All values of one column, `None` where a row lacks it.
    pub fn column(&self, name: &str) -> Vec<Option<FieldValue>> {
        self.rows.iter().map(|r| r.get(name)).collect()
    }
}

/// Event name → dataset, in the contract interface's event order.
pub type ResultMap = IndexMap<String, EventDataset>;

// ─── Tests ────────────────────────────────────────────────────────────────────
