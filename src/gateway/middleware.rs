//! Client Gateway middleware: bearer auth and CORS.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::common::auth;
use crate::engine::{Engine, error::EngineError};
use crate::model::config::Config;

/// Shared gateway state: the engine core and the configuration that decides
/// whether auth is enforced at all.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    pub config: Config,
}

/// Enforces `Authorization: Bearer <ADMIN_PASSWORD>` when auth is configured.
/// Auth is skipped entirely when `ADMIN_PASSWORD` is unset.
pub async fn auth_middleware(State(state): State<GatewayState>, request: Request<Body>, next: Next) -> Response {
    if !state.config.auth_enabled() {
        return next.run(request).await;
    }

    match auth::extract_api_key(&request) {
        Some(key) if auth::constant_time_eq(&key, &state.config.admin_password) => next.run(request).await,
        _ => EngineError::Unauthorized.into_response(),
    }
}

/// Permissive CORS for the public-facing API.
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}
