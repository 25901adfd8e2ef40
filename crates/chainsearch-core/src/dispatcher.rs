//! Concurrent dispatcher: runs batch tasks under a fixed worker budget.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::SearchError;

/// Runs a set of tasks with at most `worker_budget` in flight.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentDispatcher {
    worker_budget: usize,
}

impl ConcurrentDispatcher {
    /// A budget of zero is treated as one.
    pub fn new(worker_budget: usize) -> Self {
        Self {
            worker_budget: worker_budget.max(1),
        }
    }

    pub fn worker_budget(&self) -> usize {
        self.worker_budget
    }

    /// Spawn every task and collect their outputs in completion order.
    ///
    /// Tasks beyond the budget wait for a permit. The first error aborts
    /// all tasks still queued or running and is returned; outputs already
    /// collected are discarded with it.
    pub async fn run_all<T, F>(&self, tasks: Vec<F>) -> Result<Vec<T>, SearchError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, SearchError>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.worker_budget));
        let mut set = JoinSet::new();
        let total = tasks.len();

        for task in tasks {
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| SearchError::Task(e.to_string()))?;
                task.await
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| SearchError::Task(e.to_string()));
            match outcome.and_then(|r| r) {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        completed = results.len(),
                        total,
                        "batch failed, aborting remaining tasks"
                    );
                    set.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(results)
    }
}
