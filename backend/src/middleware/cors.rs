use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

fn allowed_headers() -> [HeaderName; 3] {
    [
        HeaderName::from_static("content-type"),
        HeaderName::from_static("x-requested-with"),
        HeaderName::from_static(super::logging::REQUEST_ID_HEADER),
    ]
}

/// Parse configured origins, dropping entries that are not valid header values.
pub fn parse_origins(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Dashboard CORS policy. `*` or an empty list mirrors the request origin.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
        .expose_headers([HeaderName::from_static(super::logging::REQUEST_ID_HEADER)]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        tracing::debug!("CORS: mirroring request origin");
        return base.allow_origin(AllowOrigin::mirror_request());
    }

    let origins = parse_origins(allowed_origins);
    if origins.is_empty() {
        tracing::warn!("CORS: no valid origins configured, mirroring request origin");
        return base.allow_origin(AllowOrigin::mirror_request());
    }
    base.allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_parse_origins_skips_invalid() {
        let origins = parse_origins(&[
            "http://localhost:3000".to_string(),
            "bad\norigin".to_string(),
        ]);
        assert_eq!(origins.len(), 1);
    }

    #[tokio::test]
    async fn test_allowed_origin_is_echoed() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(create_cors_layer(&["http://localhost:3000".to_string()]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }
}
