//! Request Engine: the hot core. Orchestrates credential selection, proxy
//! dispatch, retry/failover, streaming passthrough and cancellation.
//!
//! Retries against the next available credential on failure with a backoff
//! delay between attempts. The upstream response body is relayed as a raw
//! byte passthrough rather than reinterpreted.

pub mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;

pub use error::EngineError;

use crate::availability;
use crate::balance;
use crate::block;
use crate::model::config::Config;
use crate::proxy_selector::ProxyClientCache;
use crate::registry::{Credential, CredentialStatus, Store};
use crate::selector::KeySelector;
use crate::upstream::BASE_URL;

/// Maximum distinct credentials tried per request.
const MAX_CREDENTIAL_SWITCHES: usize = 10;
/// Retries on the same credential after its first attempt (so 4 attempts total).
const MAX_RETRIES_PER_CREDENTIAL: usize = 3;
/// Cooperative wait between retries on the same credential, polled in 1s ticks.
const RETRY_WAIT: Duration = Duration::from_secs(30);
const RETRY_POLL: Duration = Duration::from_secs(1);
/// Error text is truncated before being written to the usage log.
const MAX_ERROR_DETAIL_LEN: usize = 200;

/// Cooperative cancellation signal for one in-flight request. The gateway
/// spawns `Engine::forward` as a detached task and awaits its join handle;
/// if the client disconnects, the gateway's own future is dropped and a
/// `DisconnectGuard` held there flags this signal on drop, so the detached
/// task can notice at its next checkpoint and stop issuing upstream work.
#[derive(Clone, Default)]
pub struct DisconnectFlag(Arc<AtomicBool>);

impl DisconnectFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Events sent from the forwarding task to the gateway handler. The first
/// event is always either `Headers` (success path, streamed incrementally
/// as `Chunk`s) or `Error` (a terminal failure decided before any upstream
/// byte reached the client). Once `Headers` has been sent, headers are
/// considered flushed and a later `Error` only closes the stream, it is
/// never turned into a JSON error body.
pub enum ForwardEvent {
    Headers { status: StatusCode, content_type: String },
    Chunk(Bytes),
    End,
    Error(EngineError),
}

pub struct Engine {
    store: Arc<Store>,
    selector: Arc<KeySelector>,
    direct_client: Client,
    proxy_clients: Arc<ProxyClientCache>,
    config: Config,
}

impl Engine {
    pub fn new(
        store: Arc<Store>,
        selector: Arc<KeySelector>,
        direct_client: Client,
        proxy_clients: Arc<ProxyClientCache>,
        config: Config,
    ) -> Self {
        Self {
            store,
            selector,
            direct_client,
            proxy_clients,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The direct (no-proxy) upstream client, for admin-triggered balance
    /// probes that don't need the per-proxy cache.
    pub fn direct_client(&self) -> &Client {
        &self.direct_client
    }

    pub fn proxy_clients(&self) -> &ProxyClientCache {
        &self.proxy_clients
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `forward` never returns a value; it communicates entirely over `tx`
    /// so the gateway can start streaming the client response as soon as
    /// headers are known, without waiting for the whole upstream body.
    pub async fn forward(&self, body: Bytes, disconnect: DisconnectFlag, tx: mpsc::Sender<ForwardEvent>) {
        if let Some(block) = self.store.active_block() {
            let remaining_minutes = (block.unblock_at - Utc::now()).num_minutes().max(0);
            let _ = tx
                .send(ForwardEvent::Error(EngineError::IpBlocked {
                    unblock_at: block.unblock_at,
                    remaining_minutes,
                }))
                .await;
            return;
        }

        let stream_requested = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|v| v.get("stream").and_then(Value::as_bool).or(Some(false)))
            .unwrap_or(false);

        let Some(mut credential) = self.selector.current(&self.store) else {
            let _ = tx
                .send(ForwardEvent::Error(EngineError::ServiceUnavailable {
                    reason: "no usable credentials".to_string(),
                }))
                .await;
            return;
        };

        let mut previously_failed: Option<u64> = None;
        let mut last_error = "no usable credentials".to_string();

        for _switch in 0..MAX_CREDENTIAL_SWITCHES {
            if disconnect.is_set() {
                return;
            }

            match self.run_credential(&credential, &body, stream_requested, &disconnect, &tx).await {
                AttemptOutcome::Success => {
                    if let Some(prev_id) = previously_failed {
                        if prev_id != credential.id {
                            self.reconcile_previous_failure(prev_id).await;
                        }
                    }
                    return;
                }
                AttemptOutcome::SoftBlock(reason) => {
                    self.store.set_block(reason);
                    let block = self.store.active_block().expect("block just set");
                    let remaining_minutes = (block.unblock_at - Utc::now()).num_minutes().max(0);
                    let _ = tx
                        .send(ForwardEvent::Error(EngineError::IpBlocked {
                            unblock_at: block.unblock_at,
                            remaining_minutes,
                        }))
                        .await;
                    return;
                }
                AttemptOutcome::Disconnected => return,
                AttemptOutcome::Exhausted(reason) => {
                    previously_failed = Some(credential.id);
                    last_error = reason;
                }
            }

            match self.selector.advance(&self.store) {
                Some(next) => credential = next,
                None => break,
            }
        }

        let _ = tx
            .send(ForwardEvent::Error(EngineError::ServiceUnavailable { reason: last_error }))
            .await;
    }

    /// Runs up to `MAX_RETRIES_PER_CREDENTIAL + 1` attempts on one credential.
    async fn run_credential(
        &self,
        credential: &Credential,
        body: &Bytes,
        stream_requested: bool,
        disconnect: &DisconnectFlag,
        tx: &mpsc::Sender<ForwardEvent>,
    ) -> AttemptOutcome {
        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES_PER_CREDENTIAL {
            if disconnect.is_set() {
                return AttemptOutcome::Disconnected;
            }

            let pin = self.store.pin();
            let (client, used_pin) = match &pin {
                Some(pin) => match self.store.get_proxy(pin.proxy_id) {
                    Some(proxy) => match self.proxy_clients.get_or_build(&proxy, self.config.upstream_timeout) {
                        Ok(client) => (client, true),
                        Err(_) => (self.direct_client.clone(), false),
                    },
                    None => (self.direct_client.clone(), false),
                },
                None => (self.direct_client.clone(), false),
            };

            let response = self.dispatch(&client, credential, body).await;

            match response {
                Ok(response) if response.status().is_success() => {
                    self.finish_success(credential, response, stream_requested, disconnect, tx).await;
                    return AttemptOutcome::Success;
                }
                Ok(response) => {
                    let status = response.status();
                    let raw = response.text().await.unwrap_or_default();
                    let body_value: Value = serde_json::from_str(&raw).unwrap_or(Value::String(raw.clone()));

                    if block::is_soft_block(&body_value) {
                        return AttemptOutcome::SoftBlock(truncate(&raw));
                    }

                    let detail = format!("upstream status {status}: {}", truncate(&raw));
                    last_error = detail.clone();
                    self.store.record_usage(credential.id, false, detail.clone());
                    availability::on_failure(&self.store, credential.id, detail);

                    if used_pin {
                        self.store.clear_pin();
                    }

                    let network_trouble = status.is_server_error()
                        || status == StatusCode::FORBIDDEN
                        || status == StatusCode::TOO_MANY_REQUESTS;

                    if attempt == 0 && network_trouble {
                        if let Some(outcome) = self
                            .try_proxy_fanout(credential, body, stream_requested, disconnect, tx)
                            .await
                        {
                            return outcome;
                        }
                    }
                }
                Err(e) => {
                    let detail = format!("upstream transport error: {e}");
                    last_error = detail.clone();
                    self.store.record_usage(credential.id, false, detail.clone());
                    availability::on_failure(&self.store, credential.id, detail);

                    if used_pin {
                        self.store.clear_pin();
                    }

                    if attempt == 0 {
                        if let Some(outcome) = self
                            .try_proxy_fanout(credential, body, stream_requested, disconnect, tx)
                            .await
                        {
                            return outcome;
                        }
                    }
                }
            }

            if disconnect.is_set() {
                return AttemptOutcome::Disconnected;
            }

            let probe = balance::probe(&self.direct_client, &credential.secret).await;
            if let Some(balance_value) = probe.balance {
                if probe.ok && balance_value < availability::MIN_BALANCE {
                    availability::apply_balance(&self.store, credential.id, balance_value);
                    return AttemptOutcome::Exhausted(last_error);
                }
            }

            if attempt < MAX_RETRIES_PER_CREDENTIAL {
                if self.cancellable_wait(disconnect).await {
                    return AttemptOutcome::Disconnected;
                }
                continue;
            }

            let _ = self.store.set_status(credential.id, CredentialStatus::Error, Some(last_error.clone()));
            return AttemptOutcome::Exhausted(last_error);
        }

        AttemptOutcome::Exhausted(last_error)
    }

    /// Single-attempt iteration over every enabled outbound proxy, in order.
    /// On first success the proxy is pinned and the response is treated as
    /// this attempt's success.
    async fn try_proxy_fanout(
        &self,
        credential: &Credential,
        body: &Bytes,
        stream_requested: bool,
        disconnect: &DisconnectFlag,
        tx: &mpsc::Sender<ForwardEvent>,
    ) -> Option<AttemptOutcome> {
        if !self.store.proxy_mode_enabled() {
            return None;
        }

        for proxy in self.store.list_proxies().into_iter().filter(|p| p.enabled) {
            if disconnect.is_set() {
                return Some(AttemptOutcome::Disconnected);
            }
            let Ok(client) = self.proxy_clients.get_or_build(&proxy, self.config.upstream_timeout) else {
                continue;
            };
            let Ok(response) = self.dispatch(&client, credential, body).await else {
                continue;
            };
            if response.status().is_success() {
                self.store.set_pin(proxy.id);
                self.finish_success(credential, response, stream_requested, disconnect, tx).await;
                return Some(AttemptOutcome::Success);
            }
        }

        None
    }

    async fn dispatch(&self, client: &Client, credential: &Credential, body: &Bytes) -> reqwest::Result<reqwest::Response> {
        client
            .post(format!("{BASE_URL}/chat/completions"))
            .bearer_auth(&credential.secret)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(self.config.upstream_timeout)
            .body(body.clone())
            .send()
            .await
    }

    async fn finish_success(
        &self,
        credential: &Credential,
        response: reqwest::Response,
        stream_requested: bool,
        disconnect: &DisconnectFlag,
        tx: &mpsc::Sender<ForwardEvent>,
    ) {
        availability::on_success(&self.store, credential.id);
        let new_count = self.store.increment_calls(credential.id).unwrap_or(0);
        self.maybe_spawn_balance_check(credential.id, new_count);

        if stream_requested {
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("text/event-stream")
                .to_string();

            let mut byte_stream = response.bytes_stream();
            let mut headers_sent = false;
            let mut ended_cleanly = true;

            while let Some(chunk) = byte_stream.next().await {
                if disconnect.is_set() {
                    ended_cleanly = false;
                    break;
                }
                match chunk {
                    Ok(bytes) => {
                        if !headers_sent {
                            headers_sent = true;
                            if tx
                                .send(ForwardEvent::Headers {
                                    status: StatusCode::OK,
                                    content_type: content_type.clone(),
                                })
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        if tx.send(ForwardEvent::Chunk(bytes)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("stream interrupted after headers were sent: {}", e);
                        ended_cleanly = false;
                        break;
                    }
                }
            }

            if !headers_sent {
                let _ = tx
                    .send(ForwardEvent::Headers {
                        status: StatusCode::OK,
                        content_type,
                    })
                    .await;
            }
            if ended_cleanly {
                let _ = tx.send(ForwardEvent::End).await;
            }
            self.store.record_usage(credential.id, true, "stream completed");
        } else {
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/json")
                .to_string();
            let bytes = response.bytes().await.unwrap_or_default();
            let summary = summarize_success(&bytes);
            self.store.record_usage(credential.id, true, summary);

            if tx
                .send(ForwardEvent::Headers {
                    status: StatusCode::OK,
                    content_type,
                })
                .await
                .is_ok()
            {
                let _ = tx.send(ForwardEvent::Chunk(bytes)).await;
                let _ = tx.send(ForwardEvent::End).await;
            }
        }
    }

    /// Waits up to `RETRY_WAIT`, polled every `RETRY_POLL` against the
    /// disconnect signal. Returns true if the wait was cut short by
    /// disconnect.
    async fn cancellable_wait(&self, disconnect: &DisconnectFlag) -> bool {
        let ticks = RETRY_WAIT.as_secs() / RETRY_POLL.as_secs();
        for _ in 0..ticks {
            if disconnect.is_set() {
                return true;
            }
            tokio::time::sleep(RETRY_POLL).await;
        }
        disconnect.is_set()
    }

    /// After a different credential succeeds, probe the one that just
    /// failed exactly once: restore it if its balance has recovered. This
    /// does not run as a periodic sweep; it only fires from this call site.
    async fn reconcile_previous_failure(&self, credential_id: u64) {
        let Some(credential) = self.store.get_credential(credential_id) else {
            return;
        };
        let probe = balance::probe(&self.direct_client, &credential.secret).await;
        if let Some(balance_value) = probe.balance {
            if probe.ok && balance_value >= availability::MIN_BALANCE {
                availability::reset_and_enable(&self.store, credential_id);
            }
        }
    }

    fn maybe_spawn_balance_check(&self, credential_id: u64, call_count: u64) {
        let threshold = self.config.auto_query_balance_after_calls;
        if threshold == 0 || call_count % threshold != 0 {
            return;
        }
        let store = self.store.clone();
        let client = self.direct_client.clone();
        tokio::spawn(async move {
            let Some(credential) = store.get_credential(credential_id) else {
                return;
            };
            let result = balance::probe(&client, &credential.secret).await;
            if let Some(balance_value) = result.balance {
                availability::apply_balance(&store, credential_id, balance_value);
            }
        });
    }
}

enum AttemptOutcome {
    Success,
    SoftBlock(String),
    Disconnected,
    Exhausted(String),
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_ERROR_DETAIL_LEN {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(MAX_ERROR_DETAIL_LEN).collect();
        format!("{truncated}…")
    }
}

/// Extracts only `id`, `created`, `usage` and per-choice finish reasons from
/// a chat-completion response, never the message text, for the usage log.
fn summarize_success(bytes: &Bytes) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
        return "non-json success response".to_string();
    };
    let finish_reasons: Vec<Value> = value
        .get("choices")
        .and_then(Value::as_array)
        .map(|choices| choices.iter().map(|c| c.get("finish_reason").cloned().unwrap_or(Value::Null)).collect())
        .unwrap_or_default();

    let summary = serde_json::json!({
        "id": value.get("id"),
        "created": value.get("created"),
        "usage": value.get("usage"),
        "finish_reasons": finish_reasons,
    });
    summary.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_untouched() {
        assert_eq!(truncate("short message"), "short message");
    }

    #[test]
    fn truncate_caps_long_strings() {
        let long = "a".repeat(500);
        let truncated = truncate(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_DETAIL_LEN + 1);
    }

    #[test]
    fn summarize_success_omits_message_text() {
        let body = Bytes::from(
            serde_json::json!({
                "id": "chatcmpl-1",
                "created": 123,
                "usage": {"total_tokens": 10},
                "choices": [{"finish_reason": "stop", "message": {"content": "secret reply"}}]
            })
            .to_string(),
        );
        let summary = summarize_success(&body);
        assert!(!summary.contains("secret reply"));
        assert!(summary.contains("chatcmpl-1"));
        assert!(summary.contains("stop"));
    }

    #[test]
    fn disconnect_flag_starts_unset() {
        let flag = DisconnectFlag::new();
        assert!(!flag.is_set());
        flag.mark();
        assert!(flag.is_set());
    }
}
