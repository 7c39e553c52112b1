//! HTTP metrics middleware.
//!
//! Records every response, including the login and mode redirects issued by
//! the guards and the framework-level 404/405s that never reach a handler.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records method, normalized path, status and duration.
///
/// Applied as the outermost layer so it sees every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use metrics_util::debugging::DebuggingRecorder;
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_302() -> (StatusCode, [(header::HeaderName, &'static str); 1]) {
        (StatusCode::FOUND, [(header::LOCATION, "/login/")])
    }

    fn test_app() -> Router {
        Router::new()
            .route("/success", get(handler_200))
            .route("/redirect", get(handler_302))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn call(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_through_success() {
        assert_eq!(call("/success").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_passes_through_redirect() {
        assert_eq!(call("/redirect").await, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_middleware_records_not_found() {
        assert_eq!(call("/nonexistent").await, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_middleware_emits_request_metrics() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                call("/success").await;
            });
        });

        let names: Vec<String> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, _)| key.key().name().to_string())
            .collect();

        assert!(names.contains(&"nomnom_http_requests_total".to_string()));
        assert!(names.contains(&"nomnom_http_request_duration_seconds".to_string()));
    }
}
