//! Search configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Configuration for a [`Search`](crate::search::Search) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of sub-ranges each event's block range is divided into.
    pub batches: usize,
    /// Maximum number of batch queries in flight at once.
    pub workers: usize,
    /// How long a fetched head block number stays valid (milliseconds).
    pub block_cache_ttl_ms: u64,
    /// Ranges this many blocks wide (or narrower) are never bisected.
    pub min_bisect_width: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batches: 10,
            workers: 10,
            block_cache_ttl_ms: 10_000,
            min_bisect_width: 1,
        }
    }
}

impl SearchConfig {
    pub fn block_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.block_cache_ttl_ms)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.batches == 0 {
            return Err(SearchError::InvalidRequest("batches must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(SearchError::InvalidRequest("workers must be at least 1".into()));
        }
        if self.min_bisect_width == 0 {
            return Err(SearchError::InvalidRequest(
                "min_bisect_width must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
