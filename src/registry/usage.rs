//! Append-only usage and error log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounds the in-memory ring per credential.
pub const MAX_ENTRIES_PER_CREDENTIAL: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    pub credential_id: u64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub detail: String,
}

/// Per-credential ring buffers of the most recent attempt outcomes.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UsageLog {
    entries: std::collections::HashMap<u64, VecDeque<UsageEntry>>,
}

impl UsageLog {
    pub fn record(&mut self, credential_id: u64, success: bool, detail: impl Into<String>) {
        let ring = self.entries.entry(credential_id).or_default();
        ring.push_front(UsageEntry {
            credential_id,
            timestamp: Utc::now(),
            success,
            detail: detail.into(),
        });
        ring.truncate(MAX_ENTRIES_PER_CREDENTIAL);
    }

    /// The most recent entries for a credential, newest first.
    pub fn recent(&self, credential_id: u64, limit: usize) -> Vec<UsageEntry> {
        self.entries
            .get(&credential_id)
            .map(|ring| ring.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove_credential(&mut self, credential_id: u64) {
        self.entries.remove(&credential_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_returns_newest_first() {
        let mut log = UsageLog::default();
        log.record(1, true, "first");
        log.record(1, false, "second");
        let recent = log.recent(1, 10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].detail, "second");
        assert_eq!(recent[1].detail, "first");
    }

    #[test]
    fn ring_truncates_at_capacity() {
        let mut log = UsageLog::default();
        for i in 0..(MAX_ENTRIES_PER_CREDENTIAL + 10) {
            log.record(1, true, format!("entry-{i}"));
        }
        assert_eq!(log.recent(1, MAX_ENTRIES_PER_CREDENTIAL + 10).len(), MAX_ENTRIES_PER_CREDENTIAL);
    }
}
