//! Shared-secret bearer authentication.

use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use crate::{
    Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

/// Rejects any request whose `Authorization: Bearer <token>` does not carry
/// the configured secret.
///
/// ```rust
/// use dataproxy::security::BearerAuth;
///
/// let auth = BearerAuth::new("s3cret");
/// assert!(auth.accepts("s3cret"));
/// assert!(!auth.accepts("guess"));
/// ```
#[derive(Clone)]
pub struct BearerAuth {
    token: Arc<str>,
}

impl BearerAuth {
    /// Accepts requests bearing exactly `token`.
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Compares `candidate` against the token in constant time.
    pub fn accepts(&self, candidate: &str) -> bool {
        constant_time_eq(self.token.as_bytes(), candidate.as_bytes())
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

impl Middleware for BearerAuth {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let authorized = ctx
            .request()
            .headers()
            .bearer_token()
            .is_some_and(|token| self.accepts(token));

        if !authorized {
            warn!(path = %ctx.request().path(), "rejected unauthenticated request");
            return Box::pin(async {
                Response::error(StatusCode::Unauthorized, "missing or invalid bearer token")
            });
        }
        Box::pin(next.run(ctx))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
