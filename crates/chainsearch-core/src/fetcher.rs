//! Adaptive batch fetcher.
//!
//! Queries the node for a whole batch range. When the node answers that the
//! result set is too large, the range is bisected and both halves are fetched
//! concurrently, recursing until every piece fits under the node's limit.
//! Wide, sparse ranges are therefore served by a single call while dense ones
//! converge to whatever width the node accepts.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::SearchError;
use crate::port::NodeQueryPort;
use crate::types::{BlockRange, EventQuery, Fragment};

/// Fetches one batch, bisecting on result-size limit errors.
#[derive(Clone)]
pub struct AdaptiveBatchFetcher {
    node: Arc<dyn NodeQueryPort>,
    /// Ranges of at most this many blocks are not split further.
    min_width: u64,
}

impl AdaptiveBatchFetcher {
    pub fn new(node: Arc<dyn NodeQueryPort>, min_width: u64) -> Self {
        Self {
            node,
            min_width: min_width.max(1),
        }
    }

    /// Fetch every log of `query.event` within `query.range`.
    ///
    /// Either the whole range succeeds or an error is returned; partial
    /// results are never handed back. Non-limit node errors propagate
    /// unchanged and are not retried.
    pub fn fetch(&self, query: EventQuery) -> BoxFuture<'_, Result<Fragment, SearchError>> {
        self.fetch_range(query).boxed()
    }

    async fn fetch_range(&self, query: EventQuery) -> Result<Fragment, SearchError> {
        match self.node.query(&query.event, query.range).await {
            Ok(entries) => {
                tracing::debug!(
                    event = %query.event.name,
                    range = %query.range,
                    logs = entries.len(),
                    "batch fetched"
                );
                Ok(Fragment::from_entries(entries))
            }
            Err(e) if e.is_too_many_results() => {
                let (low, high) = self.split(query.range).ok_or(
                    SearchError::RangeNotReducible {
                        start: query.range.start(),
                        end: query.range.end(),
                    },
                )?;
                tracing::warn!(
                    event = %query.event.name,
                    range = %query.range,
                    low = %low,
                    high = %high,
                    "too many results, bisecting range"
                );
                let (low, high) = futures::try_join!(
                    self.fetch(query.with_range(low)),
                    self.fetch(query.with_range(high)),
                )?;
                Ok(low.concat(high))
            }
            Err(e) => {
                tracing::error!(
                    event = %query.event.name,
                    range = %query.range,
                    error = %e,
                    "batch fetch failed"
                );
                Err(e.into())
            }
        }
    }

    fn split(&self, range: BlockRange) -> Option<(BlockRange, BlockRange)> {
        if range.len() <= self.min_width {
            return None;
        }
        range.bisect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::types::{EventSchema, LogEntry};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Every block holds one log; ranges wider than `limit` are rejected.
    struct LimitedNode {
        limit: u64,
        calls: Mutex<Vec<BlockRange>>,
    }

    #[async_trait]
    impl NodeQueryPort for LimitedNode {
        async fn query(
            &self,
            _event: &EventSchema,
            range: BlockRange,
        ) -> Result<Vec<LogEntry>, NodeError> {
            self.calls.lock().unwrap().push(range);
            if range.len() > self.limit {
                return Err(NodeError::TooManyResults {
                    start: range.start(),
                    end: range.end(),
                });
            }
            Ok((range.start()..=range.end()).map(LogEntry::new).collect())
        }

        async fn latest_block(&self) -> Result<u64, NodeError> {
            Ok(0)
        }
    }

    fn query(start: u64, end: u64) -> EventQuery {
        EventQuery::new(
            Arc::new(EventSchema::new("Ping", "0x01", Vec::<String>::new())),
            BlockRange::new(start, end).unwrap(),
        )
    }

    #[tokio::test]
    async fn small_range_single_call() {
        let node = Arc::new(LimitedNode { limit: 100, calls: Mutex::new(vec![]) });
        let fetcher = AdaptiveBatchFetcher::new(node.clone(), 1);
        let fragment = fetcher.fetch(query(0, 9)).await.unwrap();
        assert_eq!(fragment.len(), 10);
        assert_eq!(node.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bisected_halves_concatenate_low_first() {
        let node = Arc::new(LimitedNode { limit: 3, calls: Mutex::new(vec![]) });
        let fetcher = AdaptiveBatchFetcher::new(node, 1);
        let rows = fetcher.fetch(query(10, 19)).await.unwrap().into_rows();
        let blocks: Vec<u64> = rows.iter().map(|r| r.block_number).collect();
        assert_eq!(blocks, (10..=19).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn single_block_too_large_is_not_reducible() {
        let node = Arc::new(LimitedNode { limit: 0, calls: Mutex::new(vec![]) });
        let fetcher = AdaptiveBatchFetcher::new(node, 1);
        let err = fetcher.fetch(query(5, 5)).await.unwrap_err();
        assert!(matches!(err, SearchError::RangeNotReducible { start: 5, end: 5 }));
    }

    #[tokio::test]
    async fn min_width_stops_bisection_early() {
        let node = Arc::new(LimitedNode { limit: 1, calls: Mutex::new(vec![]) });
        let fetcher = AdaptiveBatchFetcher::new(node, 4);
        let err = fetcher.fetch(query(0, 7)).await.unwrap_err();
        assert!(matches!(err, SearchError::RangeNotReducible { .. }));
    }

    #[tokio::test]
    async fn empty_answer_is_no_data() {
        struct EmptyNode;

        #[async_trait]
        impl NodeQueryPort for EmptyNode {
            async fn query(&self, _e: &EventSchema, _r: BlockRange) -> Result<Vec<LogEntry>, NodeError> {
                Ok(vec![])
            }
            async fn latest_block(&self) -> Result<u64, NodeError> {
                Ok(0)
            }
        }

        let fetcher = AdaptiveBatchFetcher::new(Arc::new(EmptyNode), 1);
        assert_eq!(fetcher.fetch(query(0, 100)).await.unwrap(), Fragment::NoData);
    }

    #[tokio::test]
    async fn other_node_errors_propagate_unchanged() {
        struct BrokenNode;

        #[async_trait]
        impl NodeQueryPort for BrokenNode {
            async fn query(&self, _e: &EventSchema, _r: BlockRange) -> Result<Vec<LogEntry>, NodeError> {
                Err(NodeError::Rpc("header not found".into()))
            }
            async fn latest_block(&self) -> Result<u64, NodeError> {
                Ok(0)
            }
        }

        let fetcher = AdaptiveBatchFetcher::new(Arc::new(BrokenNode), 1);
        let err = fetcher.fetch(query(0, 100)).await.unwrap_err();
        assert!(matches!(err, SearchError::Node(NodeError::Rpc(ref m)) if m == "header not found"));
    }
}
