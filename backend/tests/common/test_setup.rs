use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::{body::Body, http::Request, response::Response, Extension, Router};
use backend::{routes, types::Environment};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use image_storage::{
    image::Image,
    lifecycle::ImageLifecycle,
    memory::{InMemoryMetadataStore, InMemoryObjectStore},
    metadata::MetadataStore,
    object::ObjectStore,
};
use tower::ServiceExt;

/// Setup test environment variables
pub fn setup_test_env() {
    // Load test environment variables
    dotenvy::from_path(".env.example").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Router wired to in-memory stores
pub struct TestSetup {
    pub router: Router,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub objects: Arc<InMemoryObjectStore>,
}

impl TestSetup {
    pub fn new() -> Self {
        Self::with_environment(Environment::Development)
    }

    pub fn with_environment(environment: Environment) -> Self {
        setup_test_env();

        let metadata = Arc::new(InMemoryMetadataStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let metadata_store: Arc<dyn MetadataStore> = metadata.clone();
        let object_store: Arc<dyn ObjectStore> = objects.clone();
        let lifecycle = Arc::new(ImageLifecycle::new(
            metadata_store.clone(),
            object_store.clone(),
        ));

        let mut openapi = OpenApi::default();
        let router = routes::handler()
            .finish_api_with(&mut openapi, routes::api_docs)
            .layer(Extension(openapi))
            .layer(Extension(environment))
            .layer(Extension(lifecycle))
            .layer(Extension(object_store))
            .layer(Extension(metadata_store));

        Self {
            router,
            metadata,
            objects,
        }
    }

    /// Inserts an image record and stores `bytes` under its key
    pub fn seed_image(&self, id: &str, expires_at: DateTime<Utc>, bytes: &[u8]) -> Image {
        let image = Image {
            id: id.to_string(),
            original_name: "sunset.png".to_string(),
            mime_type: "image/png".to_string(),
            size: 0,
            path: format!("images/{id}-sunset.png"),
            expires_at,
            created_at: Utc::now() - Duration::minutes(1),
            url: format!("memory://images/images/{id}-sunset.png?op=get"),
            is_expired_flag: false,
        };
        self.objects.put_object(&image.path, bytes);
        self.metadata.insert(image.clone());
        image
    }

    pub async fn send_post_request(&self, route: &str, payload: serde_json::Value) -> Response {
        self.send_raw_post_request(route, payload.to_string()).await
    }

    pub async fn send_raw_post_request(&self, route: &str, body: String) -> Response {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send_get_request(&self, route: &str) -> Response {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Parse response body to JSON
pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Collect the raw response body
pub async fn response_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
