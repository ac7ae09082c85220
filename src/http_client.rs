//! HTTP client construction with optional outbound-proxy support.
//!
//! Builds the `reqwest::Client` used for upstream dispatch. A direct client
//! (no outbound proxy) is built once at startup and shared across requests;
//! per-proxy clients are built on demand by the proxy registry and cached
//! there, since each outbound proxy needs its own transport-level agent.

use reqwest::{Client, Proxy};
use std::time::Duration;

/// Outbound proxy connection details.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `socks5://host:port` or `http://host:port`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Build an HTTP client, optionally routed through a single outbound proxy.
pub fn build_client(proxy: Option<&ProxyConfig>, timeout: Duration) -> anyhow::Result<Client> {
    let mut builder = Client::builder().timeout(timeout);

    if let Some(proxy_config) = proxy {
        let mut proxy = Proxy::all(&proxy_config.url)?;
        if let (Some(username), Some(password)) = (&proxy_config.username, &proxy_config.password) {
            proxy = proxy.basic_auth(username, password);
        }
        builder = builder.proxy(proxy);
        tracing::debug!("HTTP client using proxy: {}", proxy_config.url);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_config_new_has_no_auth() {
        let config = ProxyConfig::new("http://127.0.0.1:7890");
        assert_eq!(config.url, "http://127.0.0.1:7890");
        assert!(config.username.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn proxy_config_with_auth_sets_credentials() {
        let config = ProxyConfig::new("socks5://127.0.0.1:1080").with_auth("user", "pass");
        assert_eq!(config.username, Some("user".to_string()));
        assert_eq!(config.password, Some("pass".to_string()));
    }

    #[test]
    fn build_client_without_proxy_succeeds() {
        let client = build_client(None, Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn build_client_with_proxy_succeeds() {
        let config = ProxyConfig::new("http://127.0.0.1:7890");
        let client = build_client(Some(&config), Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn build_client_rejects_malformed_proxy_url() {
        let config = ProxyConfig::new("not a url");
        assert!(build_client(Some(&config), Duration::from_secs(30)).is_err());
    }
}
