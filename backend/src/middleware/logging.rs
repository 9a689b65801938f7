use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn create_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
}

/// Logs each request with a correlation id, echoed back in `x-request-id`.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    tracing::debug!(request_id = %request_id, method = %method, uri = %uri, "incoming request");

    let mut response = next.run(request).await;
    let status = response.status();
    let duration_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::warn!(request_id = %request_id, method = %method, uri = %uri, status = %status, duration_ms, "request failed");
    } else {
        tracing::debug!(request_id = %request_id, method = %method, uri = %uri, status = %status, duration_ms, "request completed");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

pub fn parse_level(log_level: &str) -> Option<Level> {
    match log_level.trim().to_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" => Some(Level::ERROR),
        _ => None,
    }
}

/// Filter directives for this crate and its noisy dependencies. The
/// configured level wins over `RUST_LOG`.
pub fn filter_directives(level: Level) -> String {
    format!("scan_orchestrator={},tower_http=info,sqlx=warn", level)
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    let level = parse_level(log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', defaulting to INFO", log_level);
        Level::INFO
    });
    let subscriber = tracing_subscriber::registry().with(EnvFilter::new(filter_directives(level)));

    match log_format.trim().to_lowercase().as_str() {
        "plain" | "text" => subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?,
        _ => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init()?,
    }

    tracing::info!(log_level = %log_level, log_format = %log_format, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn test_request_id_is_generated_and_echoed() {
        let app = Router::new()
            .route("/test", get(ok_handler))
            .layer(middleware::from_fn(request_logging_middleware));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info"), Some(Level::INFO));
        assert_eq!(parse_level(" Warning "), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_filter_directives_target_this_crate() {
        assert_eq!(
            filter_directives(Level::DEBUG),
            "scan_orchestrator=DEBUG,tower_http=info,sqlx=warn"
        );
    }
}
