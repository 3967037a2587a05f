//! Request metrics middleware
//!
//! Records one latency observation and one counter increment per request,
//! labeled by method, matched route template, and response status. The
//! route template keeps cardinality bounded; raw paths with IDs in them
//! never reach the metrics registry.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use tenon_common::metrics::RequestMetrics;

pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let recorder = RequestMetrics::start(&method, &endpoint);
    let response = next.run(request).await;
    recorder.finish(response.status().as_u16());

    response
}
