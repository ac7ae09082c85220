//! Client Gateway HTTP handlers.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::engine::error::EngineError;
use crate::engine::{DisconnectFlag, ForwardEvent};

use super::DisconnectGuard;
use super::middleware::GatewayState;

const CHANNEL_CAPACITY: usize = 32;

/// `POST /api/proxy/chat/completions`.
pub async fn post_chat_completions(State(state): State<GatewayState>, body: Bytes) -> Response {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let disconnect = DisconnectFlag::new();
    let guard = DisconnectGuard::new(disconnect.clone());

    let engine = state.engine.clone();
    tokio::spawn(async move {
        engine.forward(body, disconnect, tx).await;
    });

    let first = rx.recv().await;
    guard.defuse();

    match first {
        Some(ForwardEvent::Error(e)) => e.into_response(),
        Some(ForwardEvent::Headers { status, content_type }) => {
            let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
                loop {
                    match rx.recv().await {
                        Some(ForwardEvent::Chunk(bytes)) => {
                            return Some((Ok::<_, std::io::Error>(bytes), rx));
                        }
                        Some(ForwardEvent::Headers { .. }) => continue,
                        Some(ForwardEvent::End) | Some(ForwardEvent::Error(_)) | None => return None,
                    }
                }
            }));

            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::CONNECTION, "keep-alive")
                .header("X-Accel-Buffering", "no")
                .body(body)
                .unwrap_or_else(|_| EngineError::Internal("failed to build response".to_string()).into_response())
        }
        None => EngineError::Internal("engine produced no response".to_string()).into_response(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    ip_blocked: bool,
    block_info: Option<BlockInfo>,
}

#[derive(Serialize)]
struct BlockInfo {
    unblock_at: chrono::DateTime<chrono::Utc>,
    reason: String,
}

/// `GET /api/proxy/health`.
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let block = state.engine.store().active_block();
    Json(HealthResponse {
        status: "ok",
        ip_blocked: block.is_some(),
        block_info: block.map(|b| BlockInfo {
            unblock_at: b.unblock_at,
            reason: b.reason,
        }),
    })
}
