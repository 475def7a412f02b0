//! Request routing: map a method and URL pattern to a handler.
//!
//! | Pattern                     | Example match        | Captured params            |
//! |-----------------------------|----------------------|----------------------------|
//! | `/health`                   | `/health`            | *(none)*                   |
//! | `/:version/:id/graphql`     | `/v5/abc/graphql`    | `version → "v5"`, `id → "abc"` |
//!
//! Trailing slashes are ignored on patterns and paths alike. Routes are tried in
//! registration order and the first match wins. A path that matches some route
//! under a different method answers `405`; anything else answers `404`.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, Parameters};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);
        if !pattern.contains(':') {
            return Self::Exact(pattern.to_owned());
        }

        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Parameter(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect();
        Self::Parameterized { segments }
    }

    fn matches(&self, path: &str) -> Option<Parameters> {
        let path = trim_trailing_slash(path);
        match self {
            Self::Exact(p) => (p == path).then(Parameters::new),
            Self::Parameterized { segments } => {
                let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if parts.len() != segments.len() {
                    return None;
                }

                let mut params = Parameters::new();
                for (segment, part) in segments.iter().zip(parts) {
                    match segment {
                        Segment::Static(s) if s == part => {}
                        Segment::Static(_) => return None,
                        Segment::Parameter(name) => params.insert(name.as_str(), part),
                    }
                }
                Some(params)
            }
        }
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Dispatches requests to registered handlers.
///
/// ```rust,no_run
/// use dataproxy::{Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.post("/:version/:id/graphql", |ctx| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates a router with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `GET` handler for `path`.
    pub fn get<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Get, path, handler);
    }

    /// Registers a `POST` handler for `path`.
    pub fn post<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Post, path, handler);
    }

    /// Registers a handler for `method` and `path`.
    pub fn add_route<H, F>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches a bare request.
    pub async fn route(&self, request: Request) -> Response {
        self.dispatch(Context::new(request)).await
    }

    /// Dispatches a context, replacing its parameters with the matched route's.
    pub async fn dispatch(&self, mut ctx: Context) -> Response {
        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = route.pattern.matches(ctx.request().path()) else {
                continue;
            };
            if &route.method != ctx.request().method() {
                path_matched = true;
                continue;
            }
            ctx.set_params(params);
            return (route.handler)(ctx).await;
        }

        if path_matched {
            Response::new(StatusCode::MethodNotAllowed)
        } else {
            Response::new(StatusCode::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn pattern_classification() {
        assert_eq!(Pattern::parse("/"), Pattern::Exact("/".into()));
        assert_eq!(Pattern::parse("/health/"), Pattern::Exact("/health".into()));
        assert_eq!(
            Pattern::parse("/:version/:id/graphql"),
            Pattern::Parameterized {
                segments: vec![
                    Segment::Parameter("version".into()),
                    Segment::Parameter("id".into()),
                    Segment::Static("graphql".into()),
                ]
            }
        );
    }

    #[test]
    fn exact_match() {
        let pat = Pattern::parse("/health");
        assert!(pat.matches("/health").is_some());
        assert!(pat.matches("/health/").is_some());
        assert!(pat.matches("/healthz").is_none());
    }

    #[test]
    fn parameterized_match() {
        let pat = Pattern::parse("/:version/:id/graphql");
        let params = pat.matches("/5.4.0/cl9k/graphql").unwrap();
        assert_eq!(params.get("version"), Some("5.4.0"));
        assert_eq!(params.get("id"), Some("cl9k"));

        assert!(pat.matches("/5.4.0/cl9k/rest").is_none());
        assert!(pat.matches("/5.4.0/graphql").is_none());
        assert!(pat.matches("/a/b/c/graphql").is_none());
    }

    #[tokio::test]
    async fn empty_router_is_404() {
        let router = Router::new();
        assert!(router.is_empty());
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let mut router = Router::new();
        router.post("/:version/:id/graphql", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/v1/x/graphql")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn handler_sees_params() {
        let mut router = Router::new();
        router.post("/:version/:id/graphql", |ctx: Context| async move {
            let id = ctx.params().get("id").unwrap_or_default().to_owned();
            Response::new(StatusCode::Ok).body(id)
        });
        let res = router.route(make_request("POST", "/v1/tenant-7/graphql")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_ref(), b"tenant-7");
    }

    #[tokio::test]
    async fn first_registered_route_wins() {
        let mut router = Router::new();
        router.get("/health", |_ctx| async { Response::new(StatusCode::Ok) });
        router.get("/health", |_ctx| async { Response::new(StatusCode::NoContent) });
        assert_eq!(router.len(), 2);
        let res = router.route(make_request("GET", "/health")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }
}
