//! Process configuration, loaded from the environment.
//!
//! Unlike the credential/proxy registries (which are mutable, admin-managed
//! state persisted to the state file), this configuration is read once at
//! startup and treated as immutable for the lifetime of the process.

use std::time::Duration;

/// Reverse proxy configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port for the client gateway.
    pub port: u16,

    /// Shared bearer token for the client and admin endpoints. Empty disables auth.
    pub admin_password: String,

    /// After every N successful calls on a credential, probe its balance asynchronously.
    /// 0 disables the feature.
    pub auto_query_balance_after_calls: u64,

    /// Upstream read timeout.
    pub upstream_timeout: Duration,

    /// Client-facing socket read/write timeout.
    pub client_socket_timeout: Duration,

    /// Path to the JSON state file backing the registries.
    pub state_file: String,
}

fn default_port() -> u16 {
    3838
}

fn default_upstream_timeout_ms() -> u64 {
    240_000
}

fn default_client_socket_timeout_ms() -> u64 {
    480_000
}

fn default_state_file() -> String {
    "proxy_state.json".to_string()
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            admin_password: String::new(),
            auto_query_balance_after_calls: 0,
            upstream_timeout: Duration::from_millis(default_upstream_timeout_ms()),
            client_socket_timeout: Duration::from_millis(default_client_socket_timeout_ms()),
            state_file: default_state_file(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", default_port()),
            admin_password: std::env::var("ADMIN_PASSWORD").unwrap_or_default(),
            auto_query_balance_after_calls: env_parsed("AUTO_QUERY_BALANCE_AFTER_CALLS", 0),
            upstream_timeout: Duration::from_millis(env_parsed(
                "UPSTREAM_TIMEOUT_MS",
                default_upstream_timeout_ms(),
            )),
            client_socket_timeout: Duration::from_millis(env_parsed(
                "CLIENT_SOCKET_TIMEOUT_MS",
                default_client_socket_timeout_ms(),
            )),
            state_file: std::env::var("STATE_FILE").unwrap_or_else(|_| default_state_file()),
        }
    }

    /// Whether bearer auth is enforced on client and admin endpoints.
    pub fn auth_enabled(&self) -> bool {
        !self.admin_password.trim().is_empty()
    }

    /// Apply CLI overrides on top of environment-derived configuration.
    pub fn with_args(mut self, port: Option<u16>, state_file: Option<String>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(state_file) = state_file {
            self.state_file = state_file;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3838);
        assert_eq!(config.upstream_timeout, Duration::from_secs(240));
        assert_eq!(config.client_socket_timeout, Duration::from_secs(480));
        assert!(!config.auth_enabled());
    }

    #[test]
    fn auth_enabled_requires_non_blank_password() {
        let mut config = Config::default();
        config.admin_password = "   ".to_string();
        assert!(!config.auth_enabled());
        config.admin_password = "secret".to_string();
        assert!(config.auth_enabled());
    }

    #[test]
    fn with_args_overrides_port_and_state_file() {
        let config = Config::default().with_args(Some(9000), Some("custom.json".to_string()));
        assert_eq!(config.port, 9000);
        assert_eq!(config.state_file, "custom.json");
    }
}
