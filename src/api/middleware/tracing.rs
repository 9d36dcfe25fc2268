//! HTTP access logging via request/response tracing.

use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Creates the access-log tracing layer.
///
/// Opens an `INFO` span per request carrying the method, path, and HTTP
/// version, and logs the status code and latency in milliseconds on response.
///
/// ```text
/// INFO request{method=POST uri=/cart/checkout version=HTTP/1.1}: finished processing request latency=4 ms status=200
/// ```
pub fn layer()
-> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}
