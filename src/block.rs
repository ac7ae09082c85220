//! Upstream-Block Detector: classifies failing responses as a global
//! soft-block and runs the periodic expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::registry::Store;

/// `serde_json::Value` trees are owned, not reference-counted, so a literal
/// cycle cannot occur here. The bound below stands in for the cycle
/// protection the source implementation needs against aliased structures;
/// in Rust it simply caps how deep the textual search descends.
const MAX_SEARCH_DEPTH: usize = 16;
const SOFT_BLOCK_CODE: i64 = 50603;

/// Returns true if the body recursively contains the substring "busy"
/// (case-insensitive) or the numeric code 50603.
pub fn is_soft_block(body: &Value) -> bool {
    contains_marker(body, 0)
}

fn contains_marker(value: &Value, depth: usize) -> bool {
    if depth > MAX_SEARCH_DEPTH {
        return false;
    }
    match value {
        Value::String(s) => s.to_lowercase().contains("busy") || s.contains(&SOFT_BLOCK_CODE.to_string()),
        Value::Number(n) => n.as_i64() == Some(SOFT_BLOCK_CODE),
        Value::Array(items) => items.iter().any(|v| contains_marker(v, depth + 1)),
        Value::Object(map) => map.values().any(|v| contains_marker(v, depth + 1)),
        Value::Bool(_) | Value::Null => false,
    }
}

/// Runs forever, purging expired block records every 5 minutes.
pub async fn run_purge_loop(store: Arc<Store>) {
    let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
    loop {
        interval.tick().await;
        store.purge_expired_block();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_busy_substring_case_insensitively() {
        let body = json!({"error": {"message": "Service BUSY, try later"}});
        assert!(is_soft_block(&body));
    }

    #[test]
    fn detects_numeric_soft_block_code() {
        let body = json!({"error": {"code": 50603}});
        assert!(is_soft_block(&body));
    }

    #[test]
    fn detects_marker_nested_in_array() {
        let body = json!({"errors": [{"message": "ok"}, {"message": "please wait, server busy"}]});
        assert!(is_soft_block(&body));
    }

    #[test]
    fn ordinary_error_is_not_a_soft_block() {
        let body = json!({"error": {"message": "invalid api key"}});
        assert!(!is_soft_block(&body));
    }

    #[test]
    fn recursion_depth_bound_stops_pathological_nesting() {
        let mut value = json!("busy");
        for _ in 0..(MAX_SEARCH_DEPTH + 20) {
            value = json!({"nested": value});
        }
        assert!(!is_soft_block(&value));
    }
}
