//! Admin API HTTP handlers: thin JSON wrappers over `AdminService`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::middleware::AdminState;
use super::types::{
    AddCredentialRequest, AddProxyRequest, SetAvailabilityRequest, SetProxyEnabledRequest,
    SetStatusRequest, SuccessResponse,
};

fn ok_json<T: serde::Serialize>(value: T) -> Response {
    Json(value).into_response()
}

pub async fn list_credentials(State(state): State<AdminState>) -> Response {
    ok_json(state.service.list_credentials())
}

pub async fn get_credential(State(state): State<AdminState>, Path(id): Path<u64>) -> Response {
    match state.service.get_credential(id) {
        Ok(view) => ok_json(view),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn add_credential(State(state): State<AdminState>, Json(req): Json<AddCredentialRequest>) -> Response {
    match state.service.add_credential(req) {
        Ok(resp) => ok_json(resp),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn delete_credential(State(state): State<AdminState>, Path(id): Path<u64>) -> Response {
    match state.service.delete_credential(id) {
        Ok(()) => ok_json(SuccessResponse::new("credential deleted")),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn set_availability(
    State(state): State<AdminState>,
    Path(id): Path<u64>,
    Json(req): Json<SetAvailabilityRequest>,
) -> Response {
    match state.service.set_availability(id, req.available) {
        Ok(()) => ok_json(SuccessResponse::new("availability updated")),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn set_status(
    State(state): State<AdminState>,
    Path(id): Path<u64>,
    Json(req): Json<SetStatusRequest>,
) -> Response {
    match state.service.set_status(id, req.status) {
        Ok(()) => ok_json(SuccessResponse::new("status updated")),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn refresh_balance(State(state): State<AdminState>, Path(id): Path<u64>) -> Response {
    match state.service.refresh_balance(id).await {
        Ok(view) => ok_json(view),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    #[serde(default = "default_usage_limit")]
    limit: usize,
}

fn default_usage_limit() -> usize {
    50
}

pub async fn list_usage(State(state): State<AdminState>, Path(id): Path<u64>, Query(query): Query<UsageQuery>) -> Response {
    ok_json(state.service.list_usage(id, query.limit))
}

pub async fn list_proxies(State(state): State<AdminState>) -> Response {
    ok_json(state.service.list_proxies())
}

pub async fn add_proxy(State(state): State<AdminState>, Json(req): Json<AddProxyRequest>) -> Response {
    ok_json(state.service.add_proxy(req))
}

pub async fn delete_proxy(State(state): State<AdminState>, Path(id): Path<u64>) -> Response {
    match state.service.delete_proxy(id) {
        Ok(()) => ok_json(SuccessResponse::new("proxy deleted")),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn set_proxy_enabled(
    State(state): State<AdminState>,
    Path(id): Path<u64>,
    Json(req): Json<SetProxyEnabledRequest>,
) -> Response {
    match state.service.set_proxy_enabled(id, req.enabled) {
        Ok(()) => ok_json(SuccessResponse::new("proxy updated")),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

pub async fn verify_proxy(State(state): State<AdminState>, Path(id): Path<u64>) -> Response {
    match state.service.verify_proxy(id).await {
        Ok(result) => ok_json(result),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetProxyModeRequest {
    pub enabled: bool,
}

pub async fn set_proxy_mode(State(state): State<AdminState>, Json(req): Json<SetProxyModeRequest>) -> Response {
    state.service.set_proxy_mode_enabled(req.enabled);
    ok_json(SuccessResponse::new("proxy mode updated"))
}

pub async fn health(State(state): State<AdminState>) -> Response {
    ok_json(state.service.health())
}
