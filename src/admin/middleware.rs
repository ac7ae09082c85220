//! Admin API shared state and authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use crate::common::auth;

use super::service::AdminService;
use super::types::AdminErrorResponse;

#[derive(Clone)]
pub struct AdminState {
    pub admin_password: String,
    pub service: Arc<AdminService>,
}

impl AdminState {
    pub fn new(admin_password: impl Into<String>, service: AdminService) -> Self {
        Self { admin_password: admin_password.into(), service: Arc::new(service) }
    }

    fn auth_enabled(&self) -> bool {
        !self.admin_password.trim().is_empty()
    }
}

/// Bearer/`x-api-key` auth, reusing the same credential the Client Gateway
/// checks, since there is exactly one operator secret for this process.
pub async fn admin_auth_middleware(State(state): State<AdminState>, request: Request<Body>, next: Next) -> Response {
    if !state.auth_enabled() {
        return next.run(request).await;
    }

    match auth::extract_api_key(&request) {
        Some(key) if auth::constant_time_eq(&key, &state.admin_password) => next.run(request).await,
        _ => {
            let error = AdminErrorResponse::authentication_error();
            (axum::http::StatusCode::UNAUTHORIZED, Json(error)).into_response()
        }
    }
}
