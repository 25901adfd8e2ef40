//! The search orchestrator.
//!
//! # Flow
//! 1. Validate the requested range against the cached head block
//! 2. For every event of the contract interface:
//!    - plan the range into `batches` sub-ranges
//!    - dispatch one adaptive fetch per sub-range (at most `workers` in flight)
//!    - merge the fragments into one block-ordered dataset
//! 3. Return event name → dataset

use std::sync::Arc;

use crate::block_cache::CurrentBlockCache;
use crate::config::SearchConfig;
use crate::dispatcher::ConcurrentDispatcher;
use crate::error::SearchError;
use crate::fetcher::AdaptiveBatchFetcher;
use crate::merger;
use crate::planner;
use crate::port::{ContractInterface, NodeQueryPort};
use crate::types::{BlockRange, EventDataset, EventQuery, EventSchema, ResultMap};

/// Block range selection for [`Search::get_events`].
///
/// `from_block` and `n_blocks_ago` are mutually exclusive. With neither set
/// the search starts at the earliest block; `to_block` defaults to the
/// current head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventsRequest {
    pub from_block: Option<i64>,
    pub to_block: Option<u64>,
    pub n_blocks_ago: Option<u64>,
}

impl EventsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_block(mut self, block: i64) -> Self {
        self.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    pub fn n_blocks_ago(mut self, blocks: u64) -> Self {
        self.n_blocks_ago = Some(blocks);
        self
    }
}

/// Fetches the complete event history of one contract.
pub struct Search {
    node: Arc<dyn NodeQueryPort>,
    contract: Arc<dyn ContractInterface>,
    config: SearchConfig,
    block_cache: CurrentBlockCache,
}

impl Search {
    pub fn new(
        node: Arc<dyn NodeQueryPort>,
        contract: Arc<dyn ContractInterface>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        let block_cache = CurrentBlockCache::new(Arc::clone(&node), config.block_cache_ttl());
        Ok(Self {
            node,
            contract,
            config,
            block_cache,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn contract(&self) -> &dyn ContractInterface {
        self.contract.as_ref()
    }

    /// Number of sub-ranges each event's range is divided into.
    pub fn batches(&self) -> usize {
        self.config.batches
    }

    pub fn set_batches(&mut self, batches: usize) -> Result<(), SearchError> {
        if batches == 0 {
            return Err(SearchError::InvalidRequest("batches must be at least 1".into()));
        }
        self.config.batches = batches;
        Ok(())
    }

    /// Maximum number of batch queries in flight.
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn set_workers(&mut self, workers: usize) -> Result<(), SearchError> {
        if workers == 0 {
            return Err(SearchError::InvalidRequest("workers must be at least 1".into()));
        }
        self.config.workers = workers;
        Ok(())
    }

    /// The node's head block, cached for the configured TTL.
    pub async fn current_block(&self) -> Result<u64, SearchError> {
        self.block_cache.current_block().await
    }

    /// Fetch every event of the contract over the requested range.
    ///
    /// Any fatal error aborts the whole call; no partial map is returned.
    pub async fn get_events(&self, request: EventsRequest) -> Result<ResultMap, SearchError> {
        let range = self.resolve_range(request).await?;
        tracing::info!(
            address = %self.contract.address(),
            range = %range,
            events = self.contract.events().len(),
            batches = self.config.batches,
            workers = self.config.workers,
            "starting event search"
        );

        let mut out = ResultMap::new();
        for event in self.contract.events() {
            let dataset = self.get_event(Arc::new(event.clone()), range).await?;
            tracing::info!(event = %event.name, rows = dataset.len(), "event search complete");
            out.insert(event.name.clone(), dataset);
        }
        Ok(out)
    }

    /// Validate `request` and turn it into a concrete block range.
    async fn resolve_range(&self, request: EventsRequest) -> Result<BlockRange, SearchError> {
        if request.from_block.is_some() && request.n_blocks_ago.is_some() {
            return Err(SearchError::InvalidRequest(
                "from_block and n_blocks_ago cannot be set at the same time".into(),
            ));
        }

        let from: i128 = match (request.from_block, request.n_blocks_ago) {
            (Some(from), _) => from as i128,
            (None, Some(ago)) => self.current_block().await? as i128 - ago as i128,
            (None, None) => 0,
        };
        let to: i128 = match request.to_block {
            Some(to) => to as i128,
            None => self.current_block().await? as i128,
        };

        if from > to {
            return Err(SearchError::InvalidRequest(format!(
                "initial block {from} is greater than final block {to}"
            )));
        }
        let current = self.current_block().await? as i128;
        if to > current {
            return Err(SearchError::InvalidRequest(format!(
                "final block {to} is greater than current block {current}"
            )));
        }
        if from < 0 {
            return Err(SearchError::InvalidRequest(format!(
                "initial block {from} can't be negative"
            )));
        }

        BlockRange::new(from as u64, to as u64)
    }

    /// Plan, dispatch and merge one event over `range`.
    async fn get_event(
        &self,
        event: Arc<EventSchema>,
        range: BlockRange,
    ) -> Result<EventDataset, SearchError> {
        let fetcher = AdaptiveBatchFetcher::new(Arc::clone(&self.node), self.config.min_bisect_width);
        let tasks: Vec<_> = planner::plan(range.start(), range.end(), self.config.batches)
            .into_iter()
            .map(|batch| {
                let fetcher = fetcher.clone();
                let query = EventQuery::new(Arc::clone(&event), batch);
                async move { fetcher.fetch(query).await }
            })
            .collect();

        tracing::debug!(event = %event.name, batches = tasks.len(), "dispatching batches");
        let fragments = ConcurrentDispatcher::new(self.config.workers)
            .run_all(tasks)
            .await?;
        Ok(merger::merge(&event, fragments))
    }
}
