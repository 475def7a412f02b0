//! Wire request envelopes and their normalized form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::action::{join_action, normalize_action};
use super::node::{Node, Record, ValueError, decode_record, map_record};

/// Selection key renamed to [`SELECT_KEY`] at every nesting level.
const SELECTION_KEY: &str = "selection";
const SELECT_KEY: &str = "select";
/// Nested argument blocks inside a selection are dropped.
const ARGUMENTS_KEY: &str = "arguments";

/// One query as sent by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuery {
    /// Absent for model-less actions such as raw queries.
    #[serde(default)]
    pub model_name: String,
    pub action: String,
    pub query: WireQueryBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireQueryBody {
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub selection: Option<Map<String, Value>>,
}

/// A request body: a single query or `{"batch": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Batch { batch: Vec<WireQuery> },
    Single(WireQuery),
}

/// A normalized unit of work handed to a [`QueryExecutor`](crate::executor::QueryExecutor).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQueryRequest {
    pub model_name: String,
    pub action: String,
    pub arguments: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Record>,
}

impl SubQueryRequest {
    /// A sub-query with no arguments and no selection.
    pub fn new(model_name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            action: action.into(),
            arguments: Record::new(),
            selection: None,
        }
    }

    #[must_use]
    pub fn argument(mut self, name: impl Into<String>, value: impl Into<Node>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn selection(mut self, selection: Record) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Key under which this query's result appears in the response payload.
    pub fn result_key(&self) -> String {
        join_action(&self.action, &self.model_name)
    }
}

impl TryFrom<WireQuery> for SubQueryRequest {
    type Error = ValueError;

    fn try_from(wire: WireQuery) -> Result<Self, Self::Error> {
        let arguments = decode_record(wire.query.arguments)?;
        let selection = wire
            .query
            .selection
            .map(decode_record)
            .transpose()?
            .map(rewrite_selection);

        Ok(Self {
            action: normalize_action(&wire.action).to_owned(),
            model_name: wire.model_name,
            arguments,
            selection,
        })
    }
}

/// Renames every `selection` key to `select` and drops nested `arguments`.
pub fn rewrite_selection(selection: Record) -> Record {
    map_record(selection, &|fields: Record| {
        fields
            .into_iter()
            .filter(|(key, _)| key != ARGUMENTS_KEY)
            .map(|(key, node)| match key.as_str() {
                SELECTION_KEY => (SELECT_KEY.to_owned(), node),
                _ => (key, node),
            })
            .collect()
    })
}

/// A normalized incoming request. Serialized form is the fingerprint input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProxyRequest {
    Single(SubQueryRequest),
    Batch(Vec<SubQueryRequest>),
}

impl ProxyRequest {
    /// The sub-queries in request order; a single request yields one.
    pub fn sub_queries(&self) -> &[SubQueryRequest] {
        match self {
            ProxyRequest::Single(query) => std::slice::from_ref(query),
            ProxyRequest::Batch(queries) => queries,
        }
    }

    /// Returns `true` for a batch request.
    pub fn is_batch(&self) -> bool {
        matches!(self, ProxyRequest::Batch(_))
    }
}

impl TryFrom<RequestBody> for ProxyRequest {
    type Error = ValueError;

    fn try_from(body: RequestBody) -> Result<Self, Self::Error> {
        Ok(match body {
            RequestBody::Single(query) => ProxyRequest::Single(query.try_into()?),
            RequestBody::Batch { batch } => ProxyRequest::Batch(
                batch
                    .into_iter()
                    .map(SubQueryRequest::try_from)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}
