//! Request tracing with the caller identity attached to each span

use axum::body::Body;
use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, Span};

use crate::api::handlers::ANONYMOUS_CALLER;
use crate::api::routes::CALLER_HEADER;

pub type RequestTraceLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, fn(&Request<Body>) -> Span>;

pub fn logging_layer() -> RequestTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(request_span as fn(&Request<Body>) -> Span)
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

fn request_span(request: &Request<Body>) -> Span {
    let caller = request
        .headers()
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(ANONYMOUS_CALLER);
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        caller = %caller,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_for_request_without_caller() {
        let request = Request::builder()
            .uri("/api/v1/actions")
            .body(Body::empty())
            .unwrap();
        // Without a subscriber the span is disabled; building it must not panic.
        let _span = request_span(&request);
        let _layer = logging_layer();
    }
}
