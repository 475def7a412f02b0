//! Typed value tree for query arguments, selections, and results.
//!
//! JSON payloads are decoded into a closed set of node kinds so that walks
//! over them are total: every [`Node`] is a scalar, a `$type`-tagged scalar,
//! a list, or a record. Tagged `DateTime` values become native timestamps on
//! the way in and are re-tagged on the way out.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key marking a tagged scalar on the wire.
pub const TYPE_TAG: &str = "$type";
/// Key holding the payload of a tagged scalar.
pub const VALUE_KEY: &str = "value";
/// Tag name for timestamps.
pub const DATE_TIME: &str = "DateTime";

/// A record's fields, kept in key order.
pub type Record = BTreeMap<String, Node>;

/// Errors raised while decoding a JSON payload into [`Node`]s.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("invalid DateTime {value:?}: {source}")]
    InvalidDateTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("tagged `{type_name}` value must carry a string `value`")]
    MalformedTag { type_name: String },
}

/// A scalar carried with an explicit `$type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedScalar {
    DateTime(DateTime<Utc>),
    /// A tag this proxy does not interpret; passed through as received.
    Other { type_name: String, value: Value },
}

/// One node of a decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `null`, a boolean, a number, or a string.
    Scalar(Value),
    Tagged(TaggedScalar),
    List(Vec<Node>),
    Record(Record),
}

impl Node {
    /// The JSON `null` node.
    pub fn null() -> Self {
        Node::Scalar(Value::Null)
    }

    /// Builds a record node from `(key, node)` pairs.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Decodes a JSON value, turning `{"$type": "DateTime", "value": ...}`
    /// objects into [`TaggedScalar::DateTime`].
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] for a `DateTime` tag whose value is not an
    /// RFC 3339 string.
    pub fn decode(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(Node::decode)
                .collect::<Result<_, _>>()
                .map(Node::List),
            Value::Object(map) => {
                let tag = map.get(TYPE_TAG).and_then(Value::as_str).map(str::to_owned);
                match tag {
                    Some(type_name) => decode_tagged(type_name, map).map(Node::Tagged),
                    None => decode_record(map).map(Node::Record),
                }
            }
            scalar => Ok(Node::Scalar(scalar)),
        }
    }

    /// Re-encodes this node as wire JSON.
    pub fn encode(&self) -> Value {
        match self {
            Node::Scalar(v) => v.clone(),
            Node::Tagged(tagged) => {
                let (type_name, value) = match tagged {
                    TaggedScalar::DateTime(dt) => (
                        DATE_TIME,
                        Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
                    ),
                    TaggedScalar::Other { type_name, value } => (type_name.as_str(), value.clone()),
                };
                let mut map = Map::with_capacity(2);
                map.insert(TYPE_TAG.to_owned(), Value::String(type_name.to_owned()));
                map.insert(VALUE_KEY.to_owned(), value);
                Value::Object(map)
            }
            Node::List(items) => Value::Array(items.iter().map(Node::encode).collect()),
            Node::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.encode()))
                    .collect(),
            ),
        }
    }

    /// Rewrites every record bottom-up: children first, then `f` on the record itself.
    pub fn map_records<F>(self, f: &F) -> Self
    where
        F: Fn(Record) -> Record,
    {
        match self {
            Node::List(items) => Node::List(items.into_iter().map(|n| n.map_records(f)).collect()),
            Node::Record(fields) => Node::Record(map_record(fields, f)),
            leaf => leaf,
        }
    }

    /// The fields of a record node.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Node::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// The timestamp of a decoded `DateTime` node.
    pub fn as_date_time(&self) -> Option<&DateTime<Utc>> {
        match self {
            Node::Tagged(TaggedScalar::DateTime(dt)) => Some(dt),
            _ => None,
        }
    }

    /// Looks up a field when this node is a record.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_record()?.get(key)
    }
}

/// Applies [`Node::map_records`] to the children of `fields`, then `f` to `fields`.
pub fn map_record<F>(fields: Record, f: &F) -> Record
where
    F: Fn(Record) -> Record,
{
    let fields = fields
        .into_iter()
        .map(|(k, v)| (k, v.map_records(f)))
        .collect();
    f(fields)
}

/// Decodes each field of a JSON object.
pub fn decode_record(map: Map<String, Value>) -> Result<Record, ValueError> {
    map.into_iter()
        .map(|(k, v)| Node::decode(v).map(|node| (k, node)))
        .collect()
}

fn decode_tagged(type_name: String, mut map: Map<String, Value>) -> Result<TaggedScalar, ValueError> {
    let value = map.remove(VALUE_KEY).unwrap_or(Value::Null);
    if type_name != DATE_TIME {
        return Ok(TaggedScalar::Other { type_name, value });
    }
    let Value::String(raw) = value else {
        return Err(ValueError::MalformedTag { type_name });
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| TaggedScalar::DateTime(dt.with_timezone(&Utc)))
        .map_err(|source| ValueError::InvalidDateTime { value: raw, source })
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(v) => v.serialize(serializer),
            Node::Tagged(_) => self.encode().serialize(serializer),
            Node::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<DateTime<Utc>> for Node {
    fn from(dt: DateTime<Utc>) -> Self {
        Node::Tagged(TaggedScalar::DateTime(dt))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Value::String(s.to_owned()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(Value::String(s))
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Scalar(Value::from(n))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Value::Bool(b))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::List(items)
    }
}

impl From<Record> for Node {
    fn from(fields: Record) -> Self {
        Node::Record(fields)
    }
}
