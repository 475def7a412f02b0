//! # dataproxy
//!
//! A caching data-access proxy. Clients POST single or batched queries; each
//! sub-query runs concurrently against a [`QueryExecutor`](executor::QueryExecutor),
//! results are folded back into one envelope, and `Cache-Control` decides
//! whether the envelope is served from, stored in, or refreshed behind the
//! response cache.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dataproxy::cache::CacheStore;
//! use dataproxy::executor::CapabilityTable;
//! use dataproxy::middleware::{LoggerMiddleware, Pipeline};
//! use dataproxy::proxy::{ProxyService, endpoint};
//! use dataproxy::query::Node;
//! use dataproxy::security::BearerAuth;
//! use dataproxy::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut table = CapabilityTable::new();
//!     table.register("User", "count", |_req| async { Ok(Node::from(0i64)) });
//!
//!     let service = ProxyService::new(Arc::new(table), Arc::new(CacheStore::new()));
//!     let pipeline = Pipeline::builder(endpoint::routes(service))
//!         .layer(LoggerMiddleware)
//!         .layer(BearerAuth::new("s3cret"))
//!         .build();
//!
//!     Server::bind("127.0.0.1:3000")
//!         .await?
//!         .run(move |req| {
//!             let pipeline = pipeline.clone();
//!             async move { pipeline.handle(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

// Core
pub mod cache;
pub mod executor;
pub mod proxy;
pub mod query;
pub mod response;

// Transport
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

// Process
pub mod background;
pub mod config;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use proxy::ProxyService;
pub use router::Router;
pub use server::{Server, ServerError};
