//! Response envelopes: mapping settled sub-queries back onto the request shape.
//!
//! A single request answers with `{"data": {...}, "errors"?: [...]}`. A batch
//! answers with `{"batchResult": [...]}`: one element per sub-query in request
//! order, plus a trailing `{"errors": [...]}` element when anything failed.
//! Failed items render as `{"data": null}`; their details live only in the
//! aggregated error list.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::executor::{SubQueryFailure, SubQueryResult};
use crate::query::ProxyRequest;

/// The client-facing part of an error entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub is_panic: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// One entry of an `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub error: String,
    pub user_facing_error: UserFacingError,
}

impl From<SubQueryFailure> for ErrorEntry {
    fn from(failure: SubQueryFailure) -> Self {
        Self {
            error: failure.message.clone(),
            user_facing_error: UserFacingError {
                is_panic: failure.is_fatal,
                message: failure.message,
                error_code: failure.code,
            },
        }
    }
}

/// One element of a `batchResult` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    /// `{"data": {...}}` on success, `{"data": null}` on failure.
    Data { data: Option<Map<String, Value>> },
    /// The trailing aggregate of every failure in the batch.
    Errors { errors: Vec<ErrorEntry> },
}

/// The body returned to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Single {
        data: Map<String, Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<Vec<ErrorEntry>>,
    },
    Batch {
        #[serde(rename = "batchResult")]
        batch_result: Vec<BatchItem>,
    },
}

impl ResponseEnvelope {
    /// `true` when any sub-query failed.
    pub fn has_errors(&self) -> bool {
        match self {
            Self::Single { errors, .. } => errors.is_some(),
            Self::Batch { batch_result } => batch_result
                .iter()
                .any(|item| matches!(item, BatchItem::Errors { .. })),
        }
    }
}

/// Builds the envelope for `request` from its settled sub-query results.
///
/// `results` must line up with [`ProxyRequest::sub_queries`]; a missing
/// result is reported as a fatal failure rather than a panic.
pub fn assemble(request: &ProxyRequest, results: Vec<SubQueryResult>) -> ResponseEnvelope {
    let mut results = results.into_iter();
    let mut next_result = move || results.next().unwrap_or_else(missing_result);

    match request {
        ProxyRequest::Single(query) => {
            let (payload, failure) = split(next_result());
            let mut data = Map::with_capacity(1);
            data.insert(query.result_key(), payload.unwrap_or(Value::Null));
            ResponseEnvelope::Single {
                data,
                errors: failure.map(|f| vec![ErrorEntry::from(f)]),
            }
        }
        ProxyRequest::Batch(queries) => {
            let mut errors = Vec::new();
            let mut batch_result: Vec<BatchItem> = queries
                .iter()
                .map(|query| {
                    let (payload, failure) = split(next_result());
                    errors.extend(failure.map(ErrorEntry::from));
                    BatchItem::Data {
                        data: payload.map(|value| {
                            let mut data = Map::with_capacity(1);
                            data.insert(query.result_key(), value);
                            data
                        }),
                    }
                })
                .collect();
            if !errors.is_empty() {
                batch_result.push(BatchItem::Errors { errors });
            }
            ResponseEnvelope::Batch { batch_result }
        }
    }
}

fn split(result: SubQueryResult) -> (Option<Value>, Option<SubQueryFailure>) {
    match result {
        SubQueryResult::Success { data } => (Some(data.encode()), None),
        SubQueryResult::Error(failure) => (None, Some(failure)),
    }
}

fn missing_result() -> SubQueryResult {
    SubQueryResult::Error(SubQueryFailure {
        message: "no result was produced for this query".to_owned(),
        is_fatal: true,
        code: None,
    })
}
