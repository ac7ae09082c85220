//! Key Selector: an ordered cursor over available credentials.
//!
//! The cursor is shared process-wide and serialized behind a short critical
//! section. The available-list snapshot lives only for the duration of one
//! `advance()` call, never stored across requests.

use parking_lot::Mutex;

use crate::registry::{Credential, CredentialStatus, Store};

pub struct KeySelector {
    cursor: Mutex<Option<u64>>,
}

impl KeySelector {
    pub fn new() -> Self {
        Self {
            cursor: Mutex::new(None),
        }
    }

    /// Returns the currently preferred credential if it is still usable,
    /// otherwise advances to the next one.
    pub fn current(&self, store: &Store) -> Option<Credential> {
        let available = store.list_available();
        let cursor = *self.cursor.lock();

        if let Some(id) = cursor {
            if let Some(credential) = available.iter().find(|c| c.id == id) {
                return Some(credential.clone());
            }
        }

        self.advance_with(store, &available)
    }

    /// Scans the available list starting just after the cursor, wrapping at
    /// most once, and returns the first active credential found.
    pub fn advance(&self, store: &Store) -> Option<Credential> {
        let available = store.list_available();
        self.advance_with(store, &available)
    }

    fn advance_with(&self, _store: &Store, available: &[Credential]) -> Option<Credential> {
        let mut cursor = self.cursor.lock();

        if available.is_empty() {
            *cursor = None;
            return None;
        }

        let start = match *cursor {
            Some(id) => available.iter().position(|c| c.id == id).map(|p| p + 1).unwrap_or(0),
            None => 0,
        };

        for offset in 0..available.len() {
            let index = (start + offset) % available.len();
            let candidate = &available[index];
            if candidate.status == CredentialStatus::Active {
                *cursor = Some(candidate.id);
                return Some(candidate.clone());
            }
        }

        *cursor = None;
        None
    }

    /// Reloads the available list; clears the cursor if it no longer points
    /// at a listed credential. Called whenever a Registry mutation can
    /// affect availability.
    pub fn refresh(&self, store: &Store) {
        let available = store.list_available();
        let mut cursor = self.cursor.lock();
        if let Some(id) = *cursor {
            if !available.iter().any(|c| c.id == id) {
                *cursor = None;
            }
        }
    }
}

impl Default for KeySelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_store() -> (Store, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "").unwrap();
        (Store::load(file.path()), file)
    }

    #[test]
    fn current_returns_none_when_no_credentials() {
        let (store, _file) = temp_store();
        let selector = KeySelector::new();
        assert!(selector.current(&store).is_none());
    }

    #[test]
    fn advance_wraps_at_most_once() {
        let (store, _file) = temp_store();
        let a = store.add_credential("a".to_string()).unwrap();
        let b = store.add_credential("b".to_string()).unwrap();
        let selector = KeySelector::new();

        let first = selector.current(&store).unwrap();
        assert_eq!(first.id, a);
        let second = selector.advance(&store).unwrap();
        assert_eq!(second.id, b);
        let third = selector.advance(&store).unwrap();
        assert_eq!(third.id, a);
    }

    #[test]
    fn advance_skips_non_active_credentials() {
        let (store, _file) = temp_store();
        let a = store.add_credential("a".to_string()).unwrap();
        let b = store.add_credential("b".to_string()).unwrap();
        store.set_status(a, CredentialStatus::Error, Some("fail".to_string())).unwrap();
        let selector = KeySelector::new();
        let picked = selector.current(&store).unwrap();
        assert_eq!(picked.id, b);
    }

    #[test]
    fn refresh_clears_cursor_when_credential_removed() {
        let (store, _file) = temp_store();
        let a = store.add_credential("a".to_string()).unwrap();
        let selector = KeySelector::new();
        selector.current(&store).unwrap();
        store.delete_credential(a).unwrap();
        selector.refresh(&store);
        assert!(selector.current(&store).is_none());
    }

    #[test]
    fn advance_returns_none_when_all_unavailable() {
        let (store, _file) = temp_store();
        let a = store.add_credential("a".to_string()).unwrap();
        store.set_status(a, CredentialStatus::Error, Some("x".to_string())).unwrap();
        let selector = KeySelector::new();
        assert!(selector.current(&store).is_none());
    }
}
