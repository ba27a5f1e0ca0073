//! Defines the HTTP surface consumed by the compose UI.
//!
//! ## Structure
//! - **Relay endpoints**
//!   - `POST /api/post`          publish or schedule a post (multipart)
//!   - `GET  /api/post-history`  upstream post history
//!   - `GET  /api/user-accounts` linked platforms and profile URLs
//!   - `GET  /api/generate-jwt`  signed URL for linking accounts
//!
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        post_handlers::{create_post, generate_jwt, post_history, user_accounts},
    },
    services::post_composer::PostComposer,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Route table; the router carries `PostComposer` to every handler.
pub fn routes() -> Router<PostComposer> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // relay endpoints
        .route("/api/post", post(create_post))
        .route("/api/post-history", get(post_history))
        .route("/api/user-accounts", get(user_accounts))
        .route("/api/generate-jwt", get(generate_jwt))
}

/// Build the complete application: routes, body limit, CORS and tracing.
pub fn router(composer: PostComposer) -> Router {
    let config = composer.config();

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    routes()
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(composer)
}
