//! An in-memory proxy: a tiny `User` table answered through the full stack.
//!
//! ```sh
//! DATABASE_URL=memory://users TOKEN=s3cret CACHE_SWEEP_INTERVAL_SECS=30 \
//!     RUST_LOG=dataproxy=debug cargo run --example memory_proxy
//!
//! curl -s localhost:3000/1/demo/graphql \
//!     -H 'Authorization: Bearer s3cret' \
//!     -H 'Cache-Control: max-age=30, stale-while-revalidate=10' \
//!     -d '{"modelName":"User","action":"findMany","query":{"arguments":{}}}'
//! ```

use std::sync::Arc;

use dataproxy::background::CacheSweeper;
use dataproxy::cache::CacheStore;
use dataproxy::config::ProxyConfig;
use dataproxy::executor::{CapabilityTable, QueryError};
use dataproxy::middleware::{LoggerMiddleware, Pipeline};
use dataproxy::proxy::{ProxyService, endpoint};
use dataproxy::query::{Node, SubQueryRequest};
use dataproxy::security::BearerAuth;
use dataproxy::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn users() -> Vec<Node> {
    [(1i64, "ada"), (2, "grace"), (3, "linus")]
        .into_iter()
        .map(|(id, name)| Node::record([("id", Node::from(id)), ("name", Node::from(name))]))
        .collect()
}

fn capabilities() -> CapabilityTable {
    let mut table = CapabilityTable::new();
    table.register("User", "findMany", |_req: SubQueryRequest| async {
        Ok(Node::from(users()))
    });
    table.register("User", "count", |_req: SubQueryRequest| async {
        Ok(Node::from(users().len() as i64))
    });
    table.register("User", "findUniqueOrThrow", |req: SubQueryRequest| async move {
        let wanted = req
            .arguments
            .get("where")
            .and_then(|w| w.get("id"))
            .cloned()
            .ok_or_else(|| QueryError::Validation("where.id is required".into()))?;
        users()
            .into_iter()
            .find(|u| u.get("id") == Some(&wanted))
            .ok_or_else(|| QueryError::known("P2025", "No User found"))
    });
    table
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dataproxy=info")),
        )
        .init();

    let config = ProxyConfig::from_env()?;
    info!(?config, "starting memory proxy");

    let cache = Arc::new(CacheStore::new());
    let _sweeper = config
        .sweep_interval
        .map(|period| CacheSweeper::spawn(Arc::clone(&cache), period));

    let service = ProxyService::new(Arc::new(capabilities()), cache);
    let pipeline = Pipeline::builder(endpoint::routes(service))
        .layer(LoggerMiddleware)
        .layer(BearerAuth::new(config.token.as_str()))
        .build();

    Server::bind(&config.bind)
        .await?
        .max_request_bytes(config.max_request_bytes)
        .run_until(
            move |req| {
                let pipeline = pipeline.clone();
                async move { pipeline.handle(req).await }
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await?;

    info!("memory proxy stopped");
    Ok(())
}
