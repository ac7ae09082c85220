//! Credential data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Insufficient,
    Error,
}

/// One upstream bearer token managed by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: u64,
    pub secret: String,
    pub status: CredentialStatus,
    pub available: bool,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub balance_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub call_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Credential {
    pub(super) fn new(id: u64, secret: String) -> Self {
        Self {
            id,
            secret,
            status: CredentialStatus::Active,
            available: true,
            balance: None,
            balance_checked_at: None,
            call_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
            error_count: 0,
            last_error: None,
        }
    }

    /// First 8 and last 4 characters of the secret, for listings that should not
    /// leak the full credential. Short secrets are masked entirely.
    pub fn masked_secret(&self) -> String {
        mask_secret(&self.secret)
    }
}

pub fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 12 {
        return "*".repeat(len);
    }
    let chars: Vec<char> = secret.chars().collect();
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_secrets_to_head_and_tail() {
        let masked = mask_secret("sk-abcdefghijklmnopqrstuvwxyz");
        assert_eq!(masked, "sk-abcdef...wxyz");
    }

    #[test]
    fn masks_short_secrets_entirely() {
        assert_eq!(mask_secret("short"), "*****");
    }

    #[test]
    fn new_credential_starts_active_and_available() {
        let credential = Credential::new(1, "secret-value-long-enough".to_string());
        assert_eq!(credential.status, CredentialStatus::Active);
        assert!(credential.available);
        assert_eq!(credential.call_count, 0);
        assert!(credential.balance.is_none());
    }
}
