//! W3C trace context propagation for outbound HTTP calls.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Write `traceparent` (and `tracestate` when non-empty) for the current span.
///
/// Leaves `headers` untouched when there is no valid OpenTelemetry context,
/// e.g. when the OTLP layer is not installed.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let context = Span::current().context();
    let span = context.span();
    let span_context = span.span_context();

    if !span_context.is_valid() {
        return;
    }

    let traceparent = format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );
    if let Ok(value) = HeaderValue::from_str(&traceparent) {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty()
        && let Ok(value) = HeaderValue::from_str(&tracestate)
    {
        headers.insert(TRACESTATE_HEADER, value);
    }
}
