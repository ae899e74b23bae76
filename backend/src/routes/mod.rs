mod docs;
/// Health check handlers
pub mod health;
/// Image handlers
pub mod images;

pub use docs::api_docs;

use aide::axum::{
    routing::{get, post},
    ApiRouter,
};

/// Creates the router with all handler routes
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .merge(docs::handler())
        .api_route("/health", get(health::handler))
        .api_route("/v1/health", get(health::handler))
        .api_route("/v1/images/health", get(health::handler))
        .api_route("/v1/images/health/deep", get(health::deep_handler))
        .api_route("/v1/images", post(images::create_image))
        .api_route("/presigned-url", post(images::create_image))
        .api_route("/v1/images/{image_id}", get(images::get_image))
        .api_route(
            "/v1/images/{image_id}/metadata",
            get(images::get_image_metadata),
        )
}
