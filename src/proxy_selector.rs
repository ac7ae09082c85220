//! Outbound-Proxy Selector: builds and caches per-proxy HTTP clients and
//! verifies reachability through a sequence of IP-echo services.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;

use crate::http_client::build_client;
use crate::registry::OutboundProxy;

const VERIFY_PRIMARY_TIMEOUT: Duration = Duration::from_secs(8);
const VERIFY_FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// IP-echo services tried in order during proxy verification: the primary,
/// then fallbacks if it is unreachable.
const IP_ECHO_SERVICES: &[&str] = &[
    "https://api.ipify.org?format=json",
    "https://ifconfig.me/all.json",
    "https://ip-api.com/json",
];

/// Builds transport-layer agents per outbound proxy and reuses them as a
/// shared resource, the same way the direct client is shared.
#[derive(Default)]
pub struct ProxyClientCache {
    clients: Mutex<HashMap<u64, Client>>,
}

impl ProxyClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&self, proxy: &OutboundProxy, timeout: Duration) -> anyhow::Result<Client> {
        if let Some(client) = self.clients.lock().get(&proxy.id) {
            return Ok(client.clone());
        }
        let client = build_client(Some(&proxy.to_proxy_config()), timeout)?;
        self.clients.lock().insert(proxy.id, client.clone());
        Ok(client)
    }

    pub fn invalidate(&self, proxy_id: u64) {
        self.clients.lock().remove(&proxy_id);
    }
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub reachable: bool,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub latency_ms: Option<u64>,
}

/// Hits the IP-echo sequence through the given proxy client. Returns the
/// first service that answers; a failure on every service reports
/// `reachable: false` rather than erroring.
pub async fn verify(client: &Client) -> VerificationResult {
    for (index, service) in IP_ECHO_SERVICES.iter().enumerate() {
        let timeout = if index == 0 {
            VERIFY_PRIMARY_TIMEOUT
        } else {
            VERIFY_FALLBACK_TIMEOUT
        };

        let started = std::time::Instant::now();
        let response = match client.get(*service).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => response,
            _ => continue,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let Ok(body) = response.json::<serde_json::Value>().await else {
            continue;
        };

        let ip = body
            .get("ip")
            .or_else(|| body.get("query"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let location = body
            .get("country")
            .or_else(|| body.get("city"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        return VerificationResult {
            reachable: true,
            ip,
            location,
            latency_ms: Some(latency_ms),
        };
    }

    VerificationResult {
        reachable: false,
        ip: None,
        location: None,
        latency_ms: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProxyScheme;

    #[test]
    fn cache_builds_and_caches_client_per_proxy() {
        let cache = ProxyClientCache::new();
        let proxy = OutboundProxy::new(1, ProxyScheme::Http, "127.0.0.1".to_string(), 7890, 0);
        assert!(cache.get_or_build(&proxy, Duration::from_secs(5)).is_ok());
        assert!(cache.clients.lock().contains_key(&1));
        assert!(cache.get_or_build(&proxy, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let cache = ProxyClientCache::new();
        let proxy = OutboundProxy::new(1, ProxyScheme::Http, "127.0.0.1".to_string(), 7890, 0);
        cache.get_or_build(&proxy, Duration::from_secs(5)).unwrap();
        cache.invalidate(1);
        assert!(cache.clients.lock().get(&1).is_none());
    }
}
