use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

/// Tags every request with an `x-request-id` and logs the envelope. Bodies
/// are never logged here; payload logging happens behind the redaction
/// module in the layers that understand the payloads.
pub async fn request_logger_middleware(mut req: Request<Body>, next: Next<Body>) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Ok(value) = request_id.parse() {
        req.headers_mut().insert("x-request-id", value);
    }

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "incoming request"
    );

    let mut response = next.run(req).await;

    let latency = start.elapsed();
    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "outgoing response"
    );

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}
