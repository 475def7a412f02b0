//! Query execution: the data-engine seam and concurrent batch dispatch.
//!
//! The data engine sits behind [`QueryExecutor`]. [`CapabilityTable`] is the
//! stock implementation: an explicit map from `(model, action)` to a typed
//! handler. [`BatchExecutor`] fans a batch out over any executor and settles
//! every sub-query into a [`SubQueryResult`], in input order.

use async_trait::async_trait;
use thiserror::Error;

use crate::query::{Node, SubQueryRequest};

pub mod batch;
pub mod capability;

pub use batch::BatchExecutor;
pub use capability::{CapabilityHandler, CapabilityTable};

/// A data engine able to answer one normalized sub-query.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs `request` and returns its payload.
    ///
    /// # Errors
    ///
    /// Any [`QueryError`]; the batch executor turns it into data rather than
    /// propagating it.
    async fn execute(&self, request: SubQueryRequest) -> Result<Node, QueryError>;
}

/// Failures reported while executing a sub-query.
///
/// [`is_fatal`](Self::is_fatal) splits them into recoverable domain errors and
/// unexpected ones. Anything not recognized as a domain error counts as fatal.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A well-formed failure reported by the engine, e.g. "record not found".
    #[error("{message}")]
    Known { code: String, message: String },

    #[error("invalid query: {0}")]
    Validation(String),

    #[error("no handler for action `{action}` on model `{model}`")]
    UnknownCapability { model: String, action: String },

    #[error("internal engine error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("query task did not complete: {0}")]
    Aborted(String),
}

impl QueryError {
    /// A recoverable engine error carrying an engine error code.
    pub fn known(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Known {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A fatal error with an arbitrary cause.
    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(error.into())
    }

    /// `true` for unexpected failures that should surface as panics to clients.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Aborted(_))
    }

    /// Engine error code, for recognized domain errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Known { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// A captured sub-query failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQueryFailure {
    pub message: String,
    pub is_fatal: bool,
    pub code: Option<String>,
}

impl From<&QueryError> for SubQueryFailure {
    fn from(error: &QueryError) -> Self {
        Self {
            message: error.to_string(),
            is_fatal: error.is_fatal(),
            code: error.code().map(str::to_owned),
        }
    }
}

/// The settled outcome of one sub-query.
#[derive(Debug, Clone, PartialEq)]
pub enum SubQueryResult {
    Success { data: Node },
    Error(SubQueryFailure),
}

impl SubQueryResult {
    /// Returns `true` for [`SubQueryResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<Node, QueryError>> for SubQueryResult {
    fn from(outcome: Result<Node, QueryError>) -> Self {
        match outcome {
            Ok(data) => Self::Success { data },
            Err(error) => Self::Error(SubQueryFailure::from(&error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_recoverable() {
        assert!(!QueryError::known("P2025", "Record not found").is_fatal());
        assert!(!QueryError::Validation("bad where".into()).is_fatal());
        assert!(
            !QueryError::UnknownCapability {
                model: "User".into(),
                action: "explode".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn unexpected_errors_are_fatal() {
        assert!(QueryError::internal("connection reset").is_fatal());
        assert!(QueryError::Aborted("panicked".into()).is_fatal());
    }

    #[test]
    fn failure_keeps_code_and_message() {
        let result = SubQueryResult::from(Err(QueryError::known("P2025", "Record not found")));
        assert_eq!(
            result,
            SubQueryResult::Error(SubQueryFailure {
                message: "Record not found".into(),
                is_fatal: false,
                code: Some("P2025".into()),
            })
        );
    }
}
