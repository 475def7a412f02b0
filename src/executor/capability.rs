//! Explicit `(model, action)` → handler table.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::{QueryError, QueryExecutor};
use crate::query::{Node, SubQueryRequest};

/// Type-erased async handler answering one kind of sub-query.
pub type CapabilityHandler =
    Arc<dyn Fn(SubQueryRequest) -> BoxFuture<'static, Result<Node, QueryError>> + Send + Sync>;

/// A [`QueryExecutor`] that dispatches on `(model_name, action)`.
///
/// Actions are matched after normalization, so register `create` rather than
/// `createOne`. Unregistered pairs fail with [`QueryError::UnknownCapability`].
///
/// # Examples
///
/// ```
/// use dataproxy::executor::CapabilityTable;
/// use dataproxy::query::Node;
///
/// let mut table = CapabilityTable::new();
/// table.register("User", "count", |_req| async { Ok(Node::from(3i64)) });
/// assert!(table.contains("User", "count"));
/// ```
#[derive(Default)]
pub struct CapabilityTable {
    handlers: HashMap<(String, String), CapabilityHandler>,
}

impl CapabilityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `action` on `model_name`, replacing any previous one.
    pub fn register<H, F>(
        &mut self,
        model_name: impl Into<String>,
        action: impl Into<String>,
        handler: H,
    ) where
        H: Fn(SubQueryRequest) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Node, QueryError>> + Send + 'static,
    {
        let handler: CapabilityHandler = Arc::new(move |request| handler(request).boxed());
        self.handlers
            .insert((model_name.into(), action.into()), handler);
    }

    /// Returns `true` if a handler is registered for `model_name.action`.
    pub fn contains(&self, model_name: &str, action: &str) -> bool {
        self.handlers
            .contains_key(&(model_name.to_owned(), action.to_owned()))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

#[async_trait]
impl QueryExecutor for CapabilityTable {
    async fn execute(&self, request: SubQueryRequest) -> Result<Node, QueryError> {
        let key = (request.model_name.clone(), request.action.clone());
        let Some(handler) = self.handlers.get(&key).cloned() else {
            debug!(model = %key.0, action = %key.1, "no capability registered");
            return Err(QueryError::UnknownCapability {
                model: key.0,
                action: key.1,
            });
        };
        handler(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CapabilityTable {
        let mut table = CapabilityTable::new();
        table.register("User", "findUnique", |req: SubQueryRequest| async move {
            let id = req.arguments.get("id").cloned().unwrap_or_else(Node::null);
            Ok(Node::record([("id", id)]))
        });
        table.register("User", "delete", |_req| async {
            Err(QueryError::known("P2025", "Record to delete does not exist."))
        });
        table
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let req = SubQueryRequest::new("User", "findUnique").argument("id", 7i64);
        let data = table().execute(req).await.unwrap();
        assert_eq!(data.get("id"), Some(&Node::from(7i64)));
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let err = table()
            .execute(SubQueryRequest::new("User", "delete"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("P2025"));
    }

    #[tokio::test]
    async fn unknown_pair_is_reported() {
        let err = table()
            .execute(SubQueryRequest::new("Post", "findUnique"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownCapability { ref model, .. } if model == "Post"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn register_replaces() {
        let mut table = table();
        assert_eq!(table.len(), 2);
        table.register("User", "delete", |_req| async { Ok(Node::null()) });
        assert_eq!(table.len(), 2);
        assert!(table.contains("User", "delete"));
        assert!(!table.contains("User", "update"));
    }
}
