//! Concurrent, failure-isolated batch dispatch.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use super::{QueryError, QueryExecutor, SubQueryResult};
use crate::query::{Node, SubQueryRequest};

/// Runs sub-queries concurrently against a [`QueryExecutor`].
///
/// Each sub-query runs on its own Tokio task, so an error or even a panic in
/// one handler cannot cancel its siblings. Results come back in input order
/// once every task has settled.
#[derive(Clone)]
pub struct BatchExecutor {
    executor: Arc<dyn QueryExecutor>,
}

impl BatchExecutor {
    /// Creates a batch runner over `executor`.
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Executes every request and returns one result per request, in order.
    ///
    /// An empty batch yields an empty vector.
    pub async fn execute_batch(&self, requests: Vec<SubQueryRequest>) -> Vec<SubQueryResult> {
        debug!(count = requests.len(), "dispatching sub-queries");
        let handles: Vec<_> = requests.into_iter().map(|r| self.spawn(r)).collect();
        join_all(handles).await.into_iter().map(settle).collect()
    }

    /// Executes a single request with the same isolation as a batch item.
    pub async fn execute_one(&self, request: SubQueryRequest) -> SubQueryResult {
        settle(self.spawn(request).await)
    }

    fn spawn(&self, request: SubQueryRequest) -> JoinHandle<Result<Node, QueryError>> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move { executor.execute(request).await })
    }
}

fn settle(joined: Result<Result<Node, QueryError>, JoinError>) -> SubQueryResult {
    let outcome = joined.unwrap_or_else(|e| Err(QueryError::Aborted(e.to_string())));
    if let Err(error) = &outcome {
        if error.is_fatal() {
            warn!(error = %error, "sub-query failed unexpectedly");
        } else {
            debug!(error = %error, "sub-query returned a domain error");
        }
    }
    SubQueryResult::from(outcome)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::executor::CapabilityTable;

    fn executor() -> BatchExecutor {
        let mut table = CapabilityTable::new();
        table.register("Item", "slow", |req: SubQueryRequest| async move {
            let ms = match req.arguments.get("ms") {
                Some(Node::Scalar(v)) => v.as_u64().unwrap_or(0),
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(Node::from(ms as i64))
        });
        table.register("Item", "missing", |_req| async {
            Err(QueryError::known("P2025", "not found"))
        });
        table.register("Item", "panic", |_req| async {
            if true {
                panic!("handler bug");
            }
            Ok(Node::null())
        });
        BatchExecutor::new(Arc::new(table))
    }

    fn slow(ms: i64) -> SubQueryRequest {
        SubQueryRequest::new("Item", "slow").argument("ms", ms)
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(executor().execute_batch(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn single_item_batch() {
        let results = executor().execute_batch(vec![slow(1)]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn order_follows_input_not_completion() {
        let results = executor()
            .execute_batch(vec![slow(30), slow(10), slow(20)])
            .await;
        let values: Vec<_> = results
            .into_iter()
            .map(|r| match r {
                SubQueryResult::Success { data } => data,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(values, vec![Node::from(30i64), Node::from(10i64), Node::from(20i64)]);
    }

    #[tokio::test]
    async fn failure_is_isolated() {
        let results = executor()
            .execute_batch(vec![
                slow(1),
                SubQueryRequest::new("Item", "missing"),
                slow(2),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], SubQueryResult::Success { data: Node::from(1i64) });
        assert!(matches!(&results[1], SubQueryResult::Error(f) if !f.is_fatal));
        assert_eq!(results[2], SubQueryResult::Success { data: Node::from(2i64) });
    }

    #[tokio::test]
    async fn panic_becomes_fatal_error() {
        let results = executor()
            .execute_batch(vec![SubQueryRequest::new("Item", "panic"), slow(1)])
            .await;
        assert!(matches!(&results[0], SubQueryResult::Error(f) if f.is_fatal));
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn execute_one_settles() {
        let result = executor()
            .execute_one(SubQueryRequest::new("Nope", "findMany"))
            .await;
        assert!(matches!(result, SubQueryResult::Error(f) if !f.is_fatal));
    }
}
