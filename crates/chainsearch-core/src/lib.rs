//! chainsearch-core: adaptive batched event-log fetching engine.
//!
//! # Architecture
//!
//! ```text
//! Search::get_events
//!     ├── CurrentBlockCache     (head block, 10 s TTL, single-flight refresh)
//!     ├── planner::plan         (range → contiguous batches)
//!     ├── ConcurrentDispatcher  (bounded worker budget)
//!     │       └── AdaptiveBatchFetcher (bisects on "too many results")
//!     └── merger::merge         (fragments → block-ordered dataset)
//! ```
//!
//! The node and the contract ABI are collaborators behind the
//! [`NodeQueryPort`] and [`ContractInterface`] traits.

pub mod block_cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod merger;
pub mod planner;
pub mod port;
pub mod search;
pub mod types;

pub use block_cache::{CachedBlockHeight, CurrentBlockCache};
pub use config::SearchConfig;
pub use dispatcher::ConcurrentDispatcher;
pub use error::{NodeError, SearchError};
pub use fetcher::AdaptiveBatchFetcher;
pub use port::{ContractInterface, NodeQueryPort, StaticContract};
pub use search::{EventsRequest, Search};
pub use types::{
    BlockRange, EventDataset, EventQuery, EventSchema, FieldValue, Fragment, LogEntry, ResultMap,
    Row,
};
