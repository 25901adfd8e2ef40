//! Current block cache: avoids asking the node for its head on every call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::SearchError;
use crate::port::NodeQueryPort;

/// A head block number and when it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedBlockHeight {
    pub value: u64,
    pub observed_at: Instant,
}

impl CachedBlockHeight {
    /// Returns `true` while the value is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.observed_at.elapsed() < ttl
    }
}

/// Process-local, time-bounded cache of the node's latest block number.
///
/// The lock is held across the refresh round trip, so concurrent callers in
/// a stale window wait for one refresh instead of racing their own.
pub struct CurrentBlockCache {
    node: Arc<dyn NodeQueryPort>,
    ttl: Duration,
    state: Mutex<Option<CachedBlockHeight>>,
}

impl CurrentBlockCache {
    pub fn new(node: Arc<dyn NodeQueryPort>, ttl: Duration) -> Self {
        Self {
            node,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached head, refreshed with one node call when stale or unset.
    pub async fn current_block(&self) -> Result<u64, SearchError> {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref().filter(|c| c.is_fresh(self.ttl)) {
            return Ok(cached.value);
        }

        let value = self.node.latest_block().await?;
        *state = Some(CachedBlockHeight {
            value,
            observed_at: Instant::now(),
        });
        tracing::debug!(block = value, "refreshed current block");
        Ok(value)
    }

    /// The last observed value without touching the node.
    pub async fn peek(&self) -> Option<CachedBlockHeight> {
        *self.state.lock().await
    }

    /// Forget the cached value; the next call refreshes.
    pub async fn invalidate(&self) {
        self.state.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::types::{BlockRange, EventSchema, LogEntry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Head advances by one on every round trip.
    #[derive(Default)]
    struct CountingNode {
        calls: AtomicU64,
    }

    #[async_trait]
    impl NodeQueryPort for CountingNode {
        async fn query(&self, _e: &EventSchema, _r: BlockRange) -> Result<Vec<LogEntry>, NodeError> {
            Ok(vec![])
        }

        async fn latest_block(&self) -> Result<u64, NodeError> {
            Ok(1_000 + self.calls.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_calls_in_window_hit_node_once() {
        let node = Arc::new(CountingNode::default());
        let cache = CurrentBlockCache::new(node.clone(), Duration::from_secs(10));

        assert_eq!(cache.current_block().await.unwrap(), 1_000);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.current_block().await.unwrap(), 1_000);
        assert_eq!(node.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_once_stale() {
        let node = Arc::new(CountingNode::default());
        let cache = CurrentBlockCache::new(node.clone(), Duration::from_secs(10));

        cache.current_block().await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.current_block().await.unwrap(), 1_001);
        assert_eq!(node.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let node = Arc::new(CountingNode::default());
        let cache = Arc::new(CurrentBlockCache::new(node.clone(), Duration::from_secs(10)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.current_block().await.unwrap() })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), 1_000);
        }
        assert_eq!(node.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let node = Arc::new(CountingNode::default());
        let cache = CurrentBlockCache::new(node.clone(), Duration::from_secs(10));

        cache.current_block().await.unwrap();
        assert!(cache.peek().await.is_some());
        cache.invalidate().await;
        assert!(cache.peek().await.is_none());
        assert_eq!(cache.current_block().await.unwrap(), 1_001);
    }
}
