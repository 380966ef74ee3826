use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Report handler time in seconds through the `x-process-time` header.
pub async fn process_time_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();

    let mut response = next.run(req).await;

    let elapsed = start.elapsed().as_secs_f64();
    tracing::debug!(path = %path, process_time = elapsed, "Request processed");

    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }

    response
}
