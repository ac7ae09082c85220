//! Availability Controller: pure policy rules applied to credentials.
//!
//! These are plain functions over the Registry rather than a stateful
//! struct. Every rule reads current credential fields and issues the
//! matching Registry mutations, keeping policy separate from storage.

use crate::registry::{CredentialStatus, Store};

/// The minimum balance a credential must hold to remain eligible.
pub const MIN_BALANCE: f64 = 1.0;
/// Consecutive failures before a credential is considered unhealthy.
pub const MAX_ERROR_COUNT: u32 = 3;

/// Clears error state on a successful request. If the credential had been
/// demoted to `error`, restores it to `active`/available as well.
pub fn on_success(store: &Store, id: u64) {
    if let Some(credential) = store.get_credential(id) {
        let _ = store.set_status(id, CredentialStatus::Active, None);
        if !credential.available {
            let _ = store.set_availability(id, true);
        }
    }
}

/// Records a failed attempt, incrementing the error count.
pub fn on_failure(store: &Store, id: u64, error: impl Into<String>) {
    let _ = store.set_status(id, CredentialStatus::Error, Some(error.into()));
}

/// Applies the balance threshold rule after a follow-up probe: a credential
/// whose balance has dropped below `MIN_BALANCE` is demoted to insufficient
/// and made unavailable, regardless of its error count.
pub fn apply_balance(store: &Store, id: u64, balance: f64) {
    let _ = store.set_balance(id, balance);
    if balance < MIN_BALANCE {
        let _ = store.set_status(id, CredentialStatus::Insufficient, None);
        let _ = store.set_availability(id, false);
    }
}

/// The periodic re-check rule: a credential becomes unavailable once its
/// error count reaches the threshold and its known balance is below the
/// minimum; it becomes available again the moment either condition fails.
/// A credential with unknown balance is never demoted by this rule alone.
pub fn recheck(store: &Store, id: u64) {
    let Some(credential) = store.get_credential(id) else {
        return;
    };
    let balance_low = matches!(credential.balance, Some(balance) if balance < MIN_BALANCE);
    let should_be_unavailable = credential.error_count >= MAX_ERROR_COUNT && balance_low;

    if should_be_unavailable && credential.available {
        let _ = store.set_availability(id, false);
    } else if !should_be_unavailable && !credential.available && credential.status != CredentialStatus::Insufficient {
        let _ = store.set_availability(id, true);
    }
}

/// Manual admin override: resets an errored credential back to active and
/// available.
pub fn reset_and_enable(store: &Store, id: u64) {
    let _ = store.set_status(id, CredentialStatus::Active, None);
    let _ = store.set_availability(id, true);
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
    fn on_success_restores_demoted_credential() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        on_failure(&store, id, "boom");
        store.set_availability(id, false).unwrap();
        on_success(&store, id);
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.status, CredentialStatus::Active);
        assert!(credential.available);
        assert_eq!(credential.error_count, 0);
    }

    #[test]
    fn apply_balance_demotes_below_minimum() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        apply_balance(&store, id, 0.2);
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.status, CredentialStatus::Insufficient);
        assert!(!credential.available);
    }

    #[test]
    fn apply_balance_leaves_healthy_credential_active() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        apply_balance(&store, id, 5.0);
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.status, CredentialStatus::Active);
        assert!(credential.available);
    }

    #[test]
    fn recheck_requires_both_error_count_and_low_balance() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        for _ in 0..3 {
            on_failure(&store, id, "boom");
        }
        recheck(&store, id);
        assert!(store.get_credential(id).unwrap().available);

        store.set_balance(id, 0.1).unwrap();
        recheck(&store, id);
        assert!(!store.get_credential(id).unwrap().available);
    }

    #[test]
    fn unknown_balance_never_demotes_alone() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        for _ in 0..5 {
            on_failure(&store, id, "boom");
        }
        recheck(&store, id);
        assert!(store.get_credential(id).unwrap().available);
    }

    #[test]
    fn reset_and_enable_clears_error_state() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        on_failure(&store, id, "boom");
        store.set_availability(id, false).unwrap();
        reset_and_enable(&store, id);
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.status, CredentialStatus::Active);
        assert!(credential.available);
    }
}
