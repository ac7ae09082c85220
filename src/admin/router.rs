//! Admin API routing: credential registry, proxy registry, usage, health.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use super::handlers::{
    add_credential, add_proxy, delete_credential, delete_proxy, get_credential, health,
    list_credentials, list_proxies, list_usage, refresh_balance, set_availability,
    set_proxy_enabled, set_proxy_mode, set_status, verify_proxy,
};
use super::middleware::{AdminState, admin_auth_middleware};

/// Mounted at `/api/admin` by `main`.
///
/// - `GET /credentials`, `POST /credentials`, `GET|DELETE /credentials/:id`
/// - `POST /credentials/:id/availability`, `POST /credentials/:id/status`
/// - `POST /credentials/:id/refresh-balance`, `GET /credentials/:id/usage`
/// - `GET /proxies`, `POST /proxies`, `DELETE /proxies/:id`
/// - `POST /proxies/:id/enabled`, `POST /proxies/:id/verify`
/// - `POST /proxy-mode`, `GET /health`
pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/credentials", get(list_credentials).post(add_credential))
        .route("/credentials/{id}", get(get_credential).delete(delete_credential))
        .route("/credentials/{id}/availability", post(set_availability))
        .route("/credentials/{id}/status", post(set_status))
        .route("/credentials/{id}/refresh-balance", post(refresh_balance))
        .route("/credentials/{id}/usage", get(list_usage))
        .route("/proxies", get(list_proxies).post(add_proxy))
        .route("/proxies/{id}", delete(delete_proxy))
        .route("/proxies/{id}/enabled", post(set_proxy_enabled))
        .route("/proxies/{id}/verify", post(verify_proxy))
        .route("/proxy-mode", post(set_proxy_mode))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
