use crate::types::Environment;
use aide::{axum::ApiRouter, openapi::OpenApi, scalar::Scalar, transform::TransformOpenApi};
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Extension, Json};

const API_TITLE: &str = "Shared Images API";

pub fn handler() -> ApiRouter {
    let scalar = Scalar::new("/openapi.json").with_title(API_TITLE);

    ApiRouter::new()
        .route("/docs", scalar.axum_route())
        .route("/openapi.json", get(openapi_schema))
}

/// Describes the API in the generated `OpenAPI` document
pub fn api_docs(api: TransformOpenApi<'_>) -> TransformOpenApi<'_> {
    api.title(API_TITLE).description(
        "Upload intents, content and metadata for shared images that expire \
         after a chosen number of minutes.",
    )
}

#[allow(clippy::unused_async)]
async fn openapi_schema(
    Extension(environment): Extension<Environment>,
    Extension(openapi): Extension<OpenApi>,
) -> impl IntoResponse {
    if !environment.show_api_docs() {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(openapi).into_response()
}
