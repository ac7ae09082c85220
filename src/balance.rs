//! Balance Probe: a single stateless call to the upstream user-info endpoint.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::upstream::BASE_URL;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Envelope for `/user/info`. The balance fields live under a nested `data`
/// object and arrive as strings, not numbers; every field defaults so a
/// partially-populated upstream response still parses.
#[derive(Debug, Default, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    data: Option<UserInfoData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoData {
    #[serde(default, deserialize_with = "deserialize_optional_f64_string")]
    balance: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64_string")]
    total_balance: Option<f64>,
}

fn deserialize_optional_f64_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[derive(Debug, Clone)]
pub struct BalanceProbeResult {
    pub ok: bool,
    pub balance: Option<f64>,
    pub message: String,
}

/// Calls upstream `/user/info` and extracts the account balance. Never
/// returns an `Err`, every fault (timeout, transport error, bad JSON, 5xx)
/// collapses into `ok: false` with a diagnostic message.
pub async fn probe(client: &Client, secret: &str) -> BalanceProbeResult {
    let url = format!("{BASE_URL}/user/info");

    let response = match client
        .get(&url)
        .bearer_auth(secret)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return BalanceProbeResult {
                ok: false,
                balance: None,
                message: format!("balance probe transport error: {e}"),
            };
        }
    };

    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return BalanceProbeResult {
            ok: true,
            balance: Some(0.0),
            message: "credential invalid or out of funds".to_string(),
        };
    }

    if !status.is_success() {
        return BalanceProbeResult {
            ok: false,
            balance: None,
            message: format!("balance probe received upstream status {status}"),
        };
    }

    match response.json::<UserInfoResponse>().await {
        Ok(body) => {
            let data = body.data.unwrap_or_default();
            let balance = data.balance.or(data.total_balance);
            match balance {
                Some(balance) => BalanceProbeResult {
                    ok: true,
                    balance: Some(balance),
                    message: "ok".to_string(),
                },
                None => BalanceProbeResult {
                    ok: false,
                    balance: None,
                    message: "balance probe response missing balance field".to_string(),
                },
            }
        }
        Err(e) => BalanceProbeResult {
            ok: false,
            balance: None,
            message: format!("balance probe failed to parse response: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_info_response_defaults_missing_fields() {
        let parsed: UserInfoResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.data.is_none());
    }

    #[test]
    fn user_info_response_reads_balance_field() {
        let parsed: UserInfoResponse =
            serde_json::from_str(r#"{"data": {"balance": "12.5"}}"#).unwrap();
        assert_eq!(parsed.data.unwrap().balance, Some(12.5));
    }

    #[test]
    fn user_info_response_reads_total_balance_fallback() {
        let parsed: UserInfoResponse =
            serde_json::from_str(r#"{"data": {"totalBalance": "3.0"}}"#).unwrap();
        assert_eq!(parsed.data.unwrap().total_balance, Some(3.0));
    }
}
