//! Outbound proxy data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http_client::ProxyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Socks5,
    Http,
    Https,
}

impl ProxyScheme {
    fn as_url_scheme(&self) -> &'static str {
        match self {
            ProxyScheme::Socks5 => "socks5",
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

/// One outbound network proxy the engine may route through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundProxy {
    pub id: u64,
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Position in the fan-out iteration order.
    pub order_index: u32,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub last_verified: bool,
    #[serde(default)]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_ip: Option<String>,
    #[serde(default)]
    pub last_location: Option<String>,
    #[serde(default)]
    pub last_latency_ms: Option<u64>,
}

impl OutboundProxy {
    pub fn new(id: u64, scheme: ProxyScheme, host: String, port: u16, order_index: u32) -> Self {
        Self {
            id,
            scheme,
            host,
            port,
            username: None,
            password: None,
            order_index,
            enabled: true,
            last_verified: false,
            last_verified_at: None,
            last_ip: None,
            last_location: None,
            last_latency_ms: None,
        }
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_url_scheme(), self.host, self.port)
    }

    pub fn to_proxy_config(&self) -> ProxyConfig {
        let mut config = ProxyConfig::new(self.url());
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_auth(username.clone(), password.clone());
        }
        config
    }
}

/// Time-bounded affinity to the outbound proxy that last succeeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProxyPin {
    pub proxy_id: u64,
    pub expires_at: DateTime<Utc>,
}

impl ProxyPin {
    pub const WINDOW_MINUTES: i64 = 60;

    pub fn new(proxy_id: u64) -> Self {
        Self {
            proxy_id,
            expires_at: Utc::now() + chrono::Duration::minutes(Self::WINDOW_MINUTES),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_formats_scheme_host_port() {
        let proxy = OutboundProxy::new(1, ProxyScheme::Socks5, "127.0.0.1".to_string(), 1080, 0);
        assert_eq!(proxy.url(), "socks5://127.0.0.1:1080");
    }

    #[test]
    fn fresh_pin_is_valid() {
        let pin = ProxyPin::new(7);
        assert!(pin.is_valid());
        assert_eq!(pin.proxy_id, 7);
    }

    #[test]
    fn expired_pin_is_invalid() {
        let mut pin = ProxyPin::new(7);
        pin.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(!pin.is_valid());
    }
}
