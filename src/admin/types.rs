//! Admin API type definitions.

use serde::{Deserialize, Serialize};

use crate::registry::{Credential, CredentialStatus, OutboundProxy, ProxyScheme, UsageEntry};

// ============ Credentials ============

/// A single credential as exposed to the admin, with its secret masked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    pub id: u64,
    pub masked_secret: String,
    pub status: CredentialStatus,
    pub available: bool,
    pub balance: Option<f64>,
    pub balance_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub call_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_count: u32,
    pub last_error: Option<String>,
}

impl From<Credential> for CredentialView {
    fn from(c: Credential) -> Self {
        Self {
            id: c.id,
            masked_secret: c.masked_secret(),
            status: c.status,
            available: c.available,
            balance: c.balance,
            balance_checked_at: c.balance_checked_at,
            call_count: c.call_count,
            created_at: c.created_at,
            last_used_at: c.last_used_at,
            error_count: c.error_count,
            last_error: c.last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialsListResponse {
    pub total: usize,
    pub available: usize,
    pub credentials: Vec<CredentialView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCredentialRequest {
    pub secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCredentialResponse {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAvailabilityRequest {
    pub available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub status: CredentialStatus,
}

// ============ Outbound proxies ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyView {
    pub id: u64,
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub order_index: u32,
    pub enabled: bool,
    pub last_verified: bool,
    pub last_verified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_ip: Option<String>,
    pub last_location: Option<String>,
    pub last_latency_ms: Option<u64>,
}

impl From<OutboundProxy> for ProxyView {
    fn from(p: OutboundProxy) -> Self {
        Self {
            id: p.id,
            scheme: p.scheme,
            host: p.host,
            port: p.port,
            order_index: p.order_index,
            enabled: p.enabled,
            last_verified: p.last_verified,
            last_verified_at: p.last_verified_at,
            last_ip: p.last_ip,
            last_location: p.last_location,
            last_latency_ms: p.last_latency_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProxyRequest {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProxyResponse {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetProxyEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyProxyResponse {
    pub reachable: bool,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub latency_ms: Option<u64>,
}

// ============ Usage ============

#[derive(Debug, Serialize)]
pub struct UsageListResponse {
    pub entries: Vec<UsageEntry>,
}

// ============ Health ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub credential_count: usize,
    pub available_credential_count: usize,
    pub proxy_mode_enabled: bool,
    pub ip_blocked: bool,
}

// ============ Common responses ============

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminErrorResponse {
    pub error: AdminError,
}

#[derive(Debug, Serialize)]
pub struct AdminError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl AdminErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: AdminError { error_type: error_type.into(), message: message.into() } }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    pub fn authentication_error() -> Self {
        Self::new("authentication_error", "invalid or missing admin credentials")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}
