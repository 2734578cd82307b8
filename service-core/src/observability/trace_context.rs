//! W3C Trace Context propagation for outgoing HTTP calls.
//!
//! Outgoing requests made through [`TracedClientExt`] carry the current
//! span's `traceparent`/`tracestate` so the library service can join the
//! client's trace.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::HeaderMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for W3C tracestate
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Inject current trace context into HTTP request headers.
///
/// Does nothing when there is no valid OpenTelemetry span in scope.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let span = Span::current();
    let context = span.context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();

    if span_context.is_valid() {
        // version-trace_id-span_id-trace_flags
        let traceparent = format!(
            "00-{}-{}-{:02x}",
            span_context.trace_id(),
            span_context.span_id(),
            span_context.trace_flags().to_u8()
        );

        if let Ok(value) = traceparent.parse() {
            headers.insert(TRACEPARENT_HEADER, value);
        }

        let tracestate_str = span_context.trace_state().header();
        if !tracestate_str.is_empty()
            && let Ok(value) = tracestate_str.parse()
        {
            headers.insert(TRACESTATE_HEADER, value);
        }
    }
}

/// Extract the traceparent header value if present.
pub fn extract_traceparent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TRACEPARENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract request ID from incoming request headers.
pub fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Wraps reqwest's RequestBuilder so trace headers are injected at send time.
pub struct TracedRequest {
    request: reqwest::RequestBuilder,
}

impl TracedRequest {
    pub fn new(request: reqwest::RequestBuilder) -> Self {
        Self { request }
    }

    pub fn header(self, key: &str, value: &str) -> Self {
        Self {
            request: self.request.header(key, value),
        }
    }

    /// Append URL query parameters.
    pub fn query<T: serde::Serialize + ?Sized>(self, query: &T) -> Self {
        Self {
            request: self.request.query(query),
        }
    }

    /// Attach a multipart form body.
    pub fn multipart(self, form: reqwest::multipart::Form) -> Self {
        Self {
            request: self.request.multipart(form),
        }
    }

    /// Send the request with trace context headers injected.
    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        self.request.headers(headers).send().await
    }
}

/// Extension trait for reqwest::Client to create traced requests.
pub trait TracedClientExt {
    fn traced_get(&self, url: &str) -> TracedRequest;
    fn traced_post(&self, url: &str) -> TracedRequest;
}

impl TracedClientExt for reqwest::Client {
    fn traced_get(&self, url: &str) -> TracedRequest {
        TracedRequest::new(self.get(url))
    }

    fn traced_post(&self, url: &str) -> TracedRequest {
        TracedRequest::new(self.post(url))
    }
}
