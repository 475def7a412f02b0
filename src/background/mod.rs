//! Background tasks: fire-and-forget work and periodic cache maintenance.
//!
//! Nothing spawned here reports back to a request path. Failures are logged
//! and dropped.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Spawns `task` detached from the caller. An `Err` outcome is logged under `name`.
///
/// The returned handle may be ignored; awaiting it never yields the task's error.
pub fn spawn_detached<F, E>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(error) = task.await {
            warn!(task = name, error = %error, "background task failed");
        }
    })
}

/// Periodically evicts expired entries from a [`CacheStore`].
///
/// The sweep stops when the `CacheSweeper` is dropped or [`stop`](Self::stop)ped.
#[derive(Debug)]
pub struct CacheSweeper {
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Starts sweeping `store` every `period`. The first sweep runs one
    /// period after the call.
    pub fn spawn<V>(store: Arc<CacheStore<V>>, period: Duration) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        info!(period_ms = period.as_millis() as u64, "starting cache sweeper");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = store.clear_old();
                debug!(evicted = report.evicted, remaining = store.len(), "periodic cache sweep");
            }
        });

        Self { handle }
    }

    /// Stops sweeping. Dropping the sweeper has the same effect.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn detached_errors_are_swallowed() {
        let handle = spawn_detached("failing", async { Err::<(), _>("nope") });
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn detached_success_runs() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        spawn_detached("ok", async move {
            let _ = tx.send(42);
            Ok::<_, std::io::Error>(())
        });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_entries() {
        let store = Arc::new(CacheStore::new());
        store.set("short", 1, Duration::from_secs(1));
        store.set("long", 2, Duration::from_secs(600));

        let sweeper = CacheSweeper::spawn(Arc::clone(&store), Duration::from_secs(5));
        settle().await;
        assert_eq!(store.len(), 2);

        advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(store.len(), 1);

        sweeper.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_sweeper_does_nothing() {
        let store = Arc::new(CacheStore::new());
        store.set("short", 1, Duration::from_secs(1));

        CacheSweeper::spawn(Arc::clone(&store), Duration::from_secs(2)).stop();
        advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(store.len(), 1);
    }
}
