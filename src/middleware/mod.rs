//! Middleware pipeline: composable before/after request logic ending in a router.
//!
//! - [`Middleware`] is implemented by every layer.
//! - [`Next`] is the cursor into the rest of the chain.
//! - [`Pipeline`] owns an ordered stack plus the terminal [`Router`].
//! - [`LoggerMiddleware`] logs one line per request.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::time::Instant;
use tracing::info;

use crate::{Request, Response, context::Context, router::Router};

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Wraps a [`Middleware`] implementation as a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// When every middleware has run, [`Next::run`] hands the context to the router.
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use dataproxy::{Response, context::Context, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    router: Arc<Router>,
    index: usize,
}

impl Next {
    /// Runs the next middleware, or the router once the chain is exhausted.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => self.router.dispatch(ctx).await,
        }
    }
}

/// A layer around request handling.
///
/// Implementations may pass through with `next.run(ctx).await`, short-circuit
/// by returning a response without calling `next`, or decorate the downstream
/// response.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// An ordered middleware stack in front of a [`Router`].
///
/// Middleware runs in the order it was added. Cloning is cheap.
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[MiddlewareHandler]>,
    router: Arc<Router>,
}

impl Pipeline {
    /// Starts a pipeline that ends in `router`.
    pub fn builder(router: Router) -> PipelineBuilder {
        PipelineBuilder {
            middlewares: Vec::new(),
            router,
        }
    }

    /// Runs `request` through every layer and the router.
    pub async fn handle(&self, request: Request) -> Response {
        let next = Next {
            middlewares: Arc::clone(&self.middlewares),
            router: Arc::clone(&self.router),
            index: 0,
        };
        next.run(Context::new(request)).await
    }
}

pub struct PipelineBuilder {
    middlewares: Vec<MiddlewareHandler>,
    router: Router,
}

impl PipelineBuilder {
    /// Appends a layer; layers run in the order they are added.
    #[must_use]
    pub fn layer<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Freezes the stack into a cloneable [`Pipeline`].
    pub fn build(self) -> Pipeline {
        Pipeline {
            middlewares: self.middlewares.into(),
            router: Arc::new(self.router),
        }
    }
}

/// Logs method, path, status and duration after the downstream handler completes.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            info!(
                %method,
                %path,
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request handled"
            );
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::StatusCode;

    fn request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.get("/ok", |_ctx| async { Response::new(StatusCode::Ok) });
        router
    }

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recorder {
        fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            self.seen.lock().unwrap().push(self.name);
            Box::pin(next.run(ctx))
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn handle(&self, _ctx: Context, _next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async { Response::new(StatusCode::Unauthorized) })
        }
    }

    #[tokio::test]
    async fn empty_pipeline_reaches_router() {
        let pipeline = Pipeline::builder(router()).build();
        assert_eq!(pipeline.handle(request("/ok")).await.status(), StatusCode::Ok);
        assert_eq!(pipeline.handle(request("/nope")).await.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn layers_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(router())
            .layer(Recorder { name: "first", seen: Arc::clone(&seen) })
            .layer(LoggerMiddleware)
            .layer(Recorder { name: "second", seen: Arc::clone(&seen) })
            .build();

        assert_eq!(pipeline.handle(request("/ok")).await.status(), StatusCode::Ok);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_router() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(router())
            .layer(Deny)
            .layer(Recorder { name: "after", seen: Arc::clone(&seen) })
            .build();

        assert_eq!(pipeline.handle(request("/ok")).await.status(), StatusCode::Unauthorized);
        assert!(seen.lock().unwrap().is_empty());
    }
}
