// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "pixxor API",
            "version": version,
            "description": "Photo album sharing: albums, members, uploads and image effects",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register, /auth/login (public - token acquisition)",
                "files": "/files/:key (public)",
                "account": "/api/auth/whoami, /api/account/onboarding (protected)",
                "albums": "/api/albums[/:album_id[/images|/members[/:user_id]]] (protected, onboarded)",
                "images": "/api/uploads[/unsorted], /api/images/:image_id[/effects] (protected, onboarded)"
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "status": "ok", "database": "ok" } })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE"
                })),
            )
        }
    }
}
