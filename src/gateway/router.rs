//! Client Gateway routing: `/api/proxy/*`.

use std::sync::Arc;

use axum::BoxError;
use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::engine::error::EngineError;
use crate::engine::Engine;
use crate::model::config::Config;

use super::handlers::{health, post_chat_completions};
use super::middleware::{GatewayState, auth_middleware, cors_layer};

/// Client request bodies are capped at 100 MB; over that, axum's
/// `DefaultBodyLimit` layer rejects the request with 413 before our handler
/// ever sees it.
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Maps a `tower::timeout::Timeout` elapsed error into the error schema's
/// `gateway_timeout` variant, the client socket timeout firing after the
/// engine failed to produce a terminal response in time.
async fn handle_socket_timeout(_err: BoxError) -> axum::response::Response {
    EngineError::GatewayTimeout.into_response()
}

pub fn create_gateway_router(engine: Arc<Engine>, config: Config) -> Router {
    let socket_timeout = config.client_socket_timeout;
    let state = GatewayState { engine, config };

    Router::new()
        .route("/chat/completions", post(post_chat_completions))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(cors_layer())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_socket_timeout))
                .layer(TimeoutLayer::new(socket_timeout)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}
