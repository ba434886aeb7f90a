use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{self, AppConfig, Environment};
use crate::database::{MemoryStore, Store};
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, require_onboarded_middleware, validate_user_middleware};
use crate::services::{AccountService, AlbumService, ImageService};
use crate::storage::{BlobStore, MemoryBlobStore};

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handles given to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Everything in memory, for tests and local runs without a database
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()), Arc::new(MemoryBlobStore::new()))
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.store.clone())
    }

    pub fn albums(&self) -> AlbumService {
        AlbumService::new(self.store.clone(), self.blobs.clone())
    }

    pub fn images(&self) -> ImageService {
        ImageService::new(self.store.clone(), self.blobs.clone())
    }
}

/// The full HTTP surface
pub fn app(state: AppState) -> Router {
    let config = config::config();

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(auth_public_routes())
        // Protected (JWT)
        .merge(account_routes(state.clone()))
        // Protected (JWT + onboarded)
        .merge(album_routes(state.clone()))
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
        .route("/files/:key", get(public::file_get))
}

fn account_routes(state: AppState) -> Router<AppState> {
    use protected::{account, auth};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/account/onboarding", put(account::onboarding_put))
        .route_layer(from_fn_with_state(state, validate_user_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn album_routes(state: AppState) -> Router<AppState> {
    use protected::{albums, images, uploads};

    let upload_limit = config::config().storage.max_upload_bytes + MULTIPART_OVERHEAD;
    let upload_routes = Router::new()
        .route("/api/uploads", post(uploads::upload_post))
        .route("/api/uploads/unsorted", post(uploads::unsorted_post))
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/api/albums", get(albums::albums_get).post(albums::albums_post))
        .route(
            "/api/albums/:album_id",
            get(albums::album_get)
                .patch(albums::album_patch)
                .delete(albums::album_delete),
        )
        .route("/api/albums/:album_id/images", get(albums::album_images_get))
        .route("/api/albums/:album_id/members", post(albums::members_post))
        .route(
            "/api/albums/:album_id/members/:user_id",
            put(albums::member_put).delete(albums::member_delete),
        )
        .route(
            "/api/images/:image_id",
            get(images::image_get).delete(images::image_delete),
        )
        .route("/api/images/:image_id/effects", post(images::effects_post))
        .merge(upload_routes)
        // Last added runs first: JWT, then user lookup, then the onboarding gate
        .route_layer(from_fn(require_onboarded_middleware))
        .route_layer(from_fn_with_state(state, validate_user_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::{generate_jwt, Claims};

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = send(app(AppState::in_memory()), get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_anything_else() {
        let (status, body) = send(app(AppState::in_memory()), get("/api/albums", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn token_for_deleted_user_is_rejected() {
        let token = generate_jwt(&Claims::new(uuid::Uuid::new_v4(), "gone@example.com".to_string())).unwrap();
        let (status, _) = send(app(AppState::in_memory()), get("/api/auth/whoami", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn onboarding_gate_applies_to_album_routes_only() {
        let state = AppState::in_memory();
        let user = state.accounts().register("new@example.com", "long-enough-pw").await.unwrap();
        let token = generate_jwt(&Claims::new(user.id, user.email.clone())).unwrap();

        let (status, body) = send(app(state.clone()), get("/api/albums", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "ONBOARDING_REQUIRED");

        let (status, body) = send(app(state), get("/api/auth/whoami", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "new@example.com");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let response = app(AppState::in_memory())
            .oneshot(get("/nope", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
