//! Query requests: wire envelopes, normalization, and the typed value tree.
//!
//! Incoming JSON is decoded into [`RequestBody`] and normalized into a
//! [`ProxyRequest`] before anything else sees it: `...One` actions lose their
//! suffix, tagged `DateTime` arguments become native timestamps, and
//! selections are rewritten into the shape data engines expect.

pub mod action;
pub mod node;
pub mod request;

pub use action::{join_action, normalize_action};
pub use node::{Node, Record, TaggedScalar, ValueError};
pub use request::{ProxyRequest, RequestBody, SubQueryRequest, WireQuery, WireQueryBody};
