//! Request context middleware: trace and request id propagation.
//!
//! Incoming `X-Trace-Id` / `X-Request-Id` headers are adopted (generated
//! when missing), stored in request extensions, attached to the request's
//! tracing span, and echoed on the response.

use axum::extract::Request;
use axum::http::{header::HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identifiers attached to every request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub req_id: String,
}

/// Axum middleware wiring the context through extensions and the span.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let trace_id = header_or_uuid(&req, TRACE_ID_HEADER);
    let req_id = header_or_uuid(&req, REQUEST_ID_HEADER);

    req.extensions_mut().insert(RequestContext {
        trace_id: trace_id.clone(),
        req_id: req_id.clone(),
    });

    let span = tracing::info_span!("request", trace_id = %trace_id, req_id = %req_id);
    let mut response = next.run(req).instrument(span).await;

    set_header(&mut response, TRACE_ID_HEADER, &trace_id);
    set_header(&mut response, REQUEST_ID_HEADER, &req_id);
    response
}

fn header_or_uuid(req: &Request, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::{middleware, Extension, Router};
    use tower::ServiceExt;

    async fn echo(Extension(ctx): Extension<RequestContext>) -> String {
        format!("{}|{}", ctx.trace_id, ctx.req_id)
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(middleware::from_fn(request_context))
    }

    #[tokio::test]
    async fn generates_ids_when_headers_are_missing() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let trace = response.headers().get(TRACE_ID_HEADER).unwrap();
        let req = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(!trace.to_str().unwrap().is_empty());
        assert!(!req.to_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn echoes_caller_provided_ids() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header("X-Trace-Id", "trace-123")
                    .header("X-Request-Id", "req-456")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(TRACE_ID_HEADER).unwrap(),
            "trace-123"
        );
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "req-456"
        );
    }
}
