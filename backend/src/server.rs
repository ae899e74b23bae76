use std::sync::Arc;
use std::time::Duration;

use aide::openapi::OpenApi;
use axum::{
    http::{HeaderValue, Method},
    Extension,
};
use datadog_tracing::axum::{shutdown_signal, OtelAxumLayer, OtelInResponseLayer};
use image_storage::{lifecycle::ImageLifecycle, metadata::MetadataStore, object::ObjectStore};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::routes;
use crate::types::Environment;

/// Request timeout applied to every route
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the CORS layer from the environment's allowed origins
///
/// Origins that are not valid header values are skipped.
#[must_use]
pub fn cors_layer(environment: &Environment) -> CorsLayer {
    let allow_origin = match environment.cors_allowed_origins() {
        None => AllowOrigin::from(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| {
                    origin
                        .parse::<HeaderValue>()
                        .inspect_err(|_| tracing::warn!("Ignoring invalid CORS origin: {origin}"))
                        .ok()
                })
                .collect();
            AllowOrigin::list(origins)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(24 * 60 * 60))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(
    environment: Environment,
    lifecycle: Arc<ImageLifecycle>,
    object_store: Arc<dyn ObjectStore>,
    metadata_store: Arc<dyn MetadataStore>,
) -> anyhow::Result<()> {
    let mut openapi = OpenApi::default();
    let cors = cors_layer(&environment);
    let port = environment.port()?;

    let router = routes::handler()
        .finish_api_with(&mut openapi, routes::api_docs)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(lifecycle))
        .layer(Extension(object_store))
        .layer(Extension(metadata_store))
        .layer(cors)
        // Include trace context as header into the response
        .layer(OtelInResponseLayer)
        // Start OpenTelemetry trace on incoming request
        .layer(OtelAxumLayer::default())
        .layer(tower_http::timeout::TimeoutLayer::new(REQUEST_TIMEOUT));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Shared images backend started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use serial_test::serial;
    use tower::ServiceExt;

    async fn preflight(environment: &Environment, origin: &str) -> axum::response::Response {
        let router = Router::new()
            .route("/v1/images", get(|| async { "ok" }))
            .layer(cors_layer(environment));

        let request = Request::builder()
            .uri("/v1/images")
            .method("OPTIONS")
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();

        router.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_cors_allows_any_origin_in_development_by_default() {
        std::env::remove_var("CORS_ALLOWED_ORIGINS");

        let response = preflight(&Environment::Development, "https://anywhere.example").await;

        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-max-age"], "86400");
        assert!(headers["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .contains("DELETE"));
    }

    #[tokio::test]
    #[serial]
    async fn test_cors_uses_configured_origins() {
        std::env::set_var("CORS_ALLOWED_ORIGINS", "https://app.example.com");

        let allowed = preflight(&Environment::Production, "https://app.example.com").await;
        let denied = preflight(&Environment::Production, "https://evil.example.com").await;

        assert_eq!(
            allowed.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
        assert!(denied
            .headers()
            .get("access-control-allow-origin")
            .is_none());

        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }
}
