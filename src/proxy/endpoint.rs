//! HTTP binding for [`ProxyService`].

use tracing::{debug, warn};

use super::ProxyService;
use crate::cache::CacheDirectives;
use crate::context::Context;
use crate::query::{ProxyRequest, RequestBody};
use crate::{Response, Router, StatusCode};

/// Path the proxy answers on. `version` and `id` are accepted but not interpreted.
pub const QUERY_ROUTE: &str = "/:version/:id/graphql";

/// A router with the query endpoint registered.
pub fn routes(service: ProxyService) -> Router {
    let mut router = Router::new();
    router.post(QUERY_ROUTE, move |ctx| {
        let service = service.clone();
        async move { handle_query(&service, ctx).await }
    });
    router
}

/// Decodes the body, applies `Cache-Control`, and answers with the envelope.
///
/// Shape errors answer 400. Anything that reaches the service answers 200,
/// even when sub-queries failed.
pub async fn handle_query(service: &ProxyService, ctx: Context) -> Response {
    let body: RequestBody = match ctx.json() {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "undecodable request body");
            return Response::error(StatusCode::BadRequest, format!("invalid request body: {e}"));
        }
    };
    let request = match ProxyRequest::try_from(body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "invalid query");
            return Response::error(StatusCode::BadRequest, e.to_string());
        }
    };

    let directives = CacheDirectives::parse(ctx.request().headers().get("cache-control"));
    debug!(
        sub_queries = request.sub_queries().len(),
        batch = request.is_batch(),
        cached = directives.is_some(),
        "handling query"
    );

    let envelope = service.handle(request, directives).await;
    Response::json(StatusCode::Ok, envelope.as_ref())
}
