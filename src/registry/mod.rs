//! Credential, outbound-proxy and usage-log storage.
//!
//! An in-memory structure guarded by `parking_lot::Mutex` for short,
//! synchronous critical sections, with write-back to a JSON state file on
//! every mutation that changes durable fields. There is no SQL engine in
//! the dependency tree; see DESIGN.md.

pub mod credential;
pub mod proxy;
pub mod usage;

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use credential::{Credential, CredentialStatus};
pub use proxy::{OutboundProxy, ProxyPin, ProxyScheme};
pub use usage::{UsageEntry, UsageLog};

/// Soft-block cooldown record. Owned by the block detector but persisted
/// alongside the rest of the durable state so a restart mid-cooldown does
/// not forget it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub blocked_at: chrono::DateTime<Utc>,
    pub unblock_at: chrono::DateTime<Utc>,
    pub reason: String,
}

impl BlockRecord {
    pub fn active(&self) -> bool {
        Utc::now() < self.unblock_at
    }
}

/// Error returned when adding a credential whose secret already exists.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a credential with this secret already exists")]
    DuplicateSecret,
    #[error("credential {0} not found")]
    CredentialNotFound(u64),
    #[error("proxy {0} not found")]
    ProxyNotFound(u64),
}

#[derive(Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    credentials: Vec<Credential>,
    #[serde(default)]
    next_credential_id: u64,
    #[serde(default)]
    proxies: Vec<OutboundProxy>,
    #[serde(default)]
    next_proxy_id: u64,
    #[serde(default)]
    pin: Option<ProxyPin>,
    #[serde(default)]
    block: Option<BlockRecord>,
    #[serde(default)]
    proxy_mode_enabled: bool,
}

struct Inner {
    credentials: Vec<Credential>,
    next_credential_id: u64,
    proxies: Vec<OutboundProxy>,
    next_proxy_id: u64,
    pin: Option<ProxyPin>,
    block: Option<BlockRecord>,
    proxy_mode_enabled: bool,
    usage: UsageLog,
}

/// The authoritative shared state: credential registry, outbound-proxy
/// registry, proxy pin, block record, and usage log.
pub struct Store {
    inner: Mutex<Inner>,
    state_file: PathBuf,
}

impl Store {
    /// Load from `state_file` if it exists and parses; otherwise start empty.
    /// A missing or unparsable file is not fatal, the registries simply
    /// start empty.
    pub fn load(state_file: impl AsRef<Path>) -> Self {
        let state_file = state_file.as_ref().to_path_buf();
        let persisted = std::fs::read_to_string(&state_file)
            .ok()
            .and_then(|content| match serde_json::from_str::<PersistedState>(&content) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!("failed to parse state file, starting empty: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            inner: Mutex::new(Inner {
                credentials: persisted.credentials,
                next_credential_id: persisted.next_credential_id,
                proxies: persisted.proxies,
                next_proxy_id: persisted.next_proxy_id,
                pin: persisted.pin,
                block: persisted.block,
                proxy_mode_enabled: persisted.proxy_mode_enabled,
                usage: UsageLog::default(),
            }),
            state_file,
        }
    }

    fn persist(&self, inner: &Inner) {
        let snapshot = PersistedState {
            credentials: inner.credentials.clone(),
            next_credential_id: inner.next_credential_id,
            proxies: inner.proxies.clone(),
            next_proxy_id: inner.next_proxy_id,
            pin: inner.pin,
            block: inner.block.clone(),
            proxy_mode_enabled: inner.proxy_mode_enabled,
        };
        let path = self.state_file.clone();
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                let write = move || {
                    if let Err(e) = std::fs::write(&path, json) {
                        tracing::warn!("failed to write state file {:?}: {}", path, e);
                    }
                };
                if tokio::runtime::Handle::try_current().is_ok() {
                    tokio::task::block_in_place(write);
                } else {
                    write();
                }
            }
            Err(e) => tracing::warn!("failed to serialize state: {}", e),
        }
    }

    // ---- Credential Registry ----

    pub fn add_credential(&self, secret: String) -> Result<u64, RegistryError> {
        let mut inner = self.inner.lock();
        if inner.credentials.iter().any(|c| c.secret == secret) {
            return Err(RegistryError::DuplicateSecret);
        }
        inner.next_credential_id += 1;
        let id = inner.next_credential_id;
        inner.credentials.push(Credential::new(id, secret));
        self.persist(&inner);
        Ok(id)
    }

    pub fn delete_credential(&self, id: u64) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let before = inner.credentials.len();
        inner.credentials.retain(|c| c.id != id);
        if inner.credentials.len() == before {
            return Err(RegistryError::CredentialNotFound(id));
        }
        inner.usage.remove_credential(id);
        self.persist(&inner);
        Ok(())
    }

    pub fn list_credentials(&self) -> Vec<Credential> {
        self.inner.lock().credentials.clone()
    }

    /// Available credentials (status=active, availability=true), ordered by
    /// creation ascending, the order the Key Selector scans.
    pub fn list_available(&self) -> Vec<Credential> {
        let mut list: Vec<Credential> = self
            .inner
            .lock()
            .credentials
            .iter()
            .filter(|c| c.available && c.status == CredentialStatus::Active)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.created_at);
        list
    }

    pub fn get_credential(&self, id: u64) -> Option<Credential> {
        self.inner.lock().credentials.iter().find(|c| c.id == id).cloned()
    }

    pub fn set_status(&self, id: u64, status: CredentialStatus, err: Option<String>) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let credential = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RegistryError::CredentialNotFound(id))?;
        credential.status = status;
        match &err {
            Some(message) => {
                credential.error_count += 1;
                credential.last_error = Some(message.clone());
            }
            None if status == CredentialStatus::Error => {
                // status=error requires error_count > 0; a caller that sets
                // error status without an error text does not get to zero it.
                if credential.error_count == 0 {
                    credential.error_count = 1;
                }
            }
            None => {
                credential.error_count = 0;
                credential.last_error = None;
            }
        }
        self.persist(&inner);
        Ok(())
    }

    pub fn set_balance(&self, id: u64, balance: f64) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let credential = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RegistryError::CredentialNotFound(id))?;
        credential.balance = Some(balance);
        credential.balance_checked_at = Some(Utc::now());
        self.persist(&inner);
        Ok(())
    }

    pub fn set_availability(&self, id: u64, available: bool) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let credential = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RegistryError::CredentialNotFound(id))?;
        credential.available = available;
        self.persist(&inner);
        Ok(())
    }

    pub fn increment_calls(&self, id: u64) -> Result<u64, RegistryError> {
        let mut inner = self.inner.lock();
        let credential = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RegistryError::CredentialNotFound(id))?;
        credential.call_count += 1;
        credential.last_used_at = Some(Utc::now());
        let new_count = credential.call_count;
        self.persist(&inner);
        Ok(new_count)
    }

    // ---- Usage & Error Log ----

    pub fn record_usage(&self, credential_id: u64, success: bool, detail: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.usage.record(credential_id, success, detail);
    }

    pub fn recent_usage(&self, credential_id: u64, limit: usize) -> Vec<UsageEntry> {
        self.inner.lock().usage.recent(credential_id, limit)
    }

    // ---- Outbound-Proxy Registry ----

    pub fn proxy_mode_enabled(&self) -> bool {
        self.inner.lock().proxy_mode_enabled
    }

    pub fn set_proxy_mode_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.proxy_mode_enabled = enabled;
        self.persist(&inner);
    }

    pub fn add_proxy(&self, scheme: ProxyScheme, host: String, port: u16) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_proxy_id += 1;
        let id = inner.next_proxy_id;
        let order_index = inner.proxies.len() as u32;
        inner.proxies.push(OutboundProxy::new(id, scheme, host, port, order_index));
        self.persist(&inner);
        id
    }

    pub fn delete_proxy(&self, id: u64) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let before = inner.proxies.len();
        inner.proxies.retain(|p| p.id != id);
        if inner.proxies.len() == before {
            return Err(RegistryError::ProxyNotFound(id));
        }
        if inner.pin.map(|p| p.proxy_id) == Some(id) {
            inner.pin = None;
        }
        self.persist(&inner);
        Ok(())
    }

    /// Ordered by `order_index`, the order the fan-out iterates in.
    pub fn list_proxies(&self) -> Vec<OutboundProxy> {
        let mut list = self.inner.lock().proxies.clone();
        list.sort_by_key(|p| p.order_index);
        list
    }

    pub fn get_proxy(&self, id: u64) -> Option<OutboundProxy> {
        self.inner.lock().proxies.iter().find(|p| p.id == id).cloned()
    }

    pub fn set_proxy_enabled(&self, id: u64, enabled: bool) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let proxy = inner
            .proxies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::ProxyNotFound(id))?;
        proxy.enabled = enabled;
        self.persist(&inner);
        Ok(())
    }

    pub fn record_proxy_verification(
        &self,
        id: u64,
        ip: Option<String>,
        location: Option<String>,
        latency_ms: Option<u64>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let proxy = inner
            .proxies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::ProxyNotFound(id))?;
        proxy.last_verified = ip.is_some();
        proxy.last_verified_at = Some(Utc::now());
        proxy.last_ip = ip;
        proxy.last_location = location;
        proxy.last_latency_ms = latency_ms;
        self.persist(&inner);
        Ok(())
    }

    pub fn pin(&self) -> Option<ProxyPin> {
        let inner = self.inner.lock();
        inner.pin.filter(|p| p.is_valid())
    }

    pub fn set_pin(&self, proxy_id: u64) {
        let mut inner = self.inner.lock();
        inner.pin = Some(ProxyPin::new(proxy_id));
        self.persist(&inner);
    }

    pub fn clear_pin(&self) {
        let mut inner = self.inner.lock();
        if inner.pin.is_some() {
            inner.pin = None;
            self.persist(&inner);
        }
    }

    // ---- Upstream-Block Detector ----

    pub fn active_block(&self) -> Option<BlockRecord> {
        let inner = self.inner.lock();
        inner.block.clone().filter(BlockRecord::active)
    }

    pub fn set_block(&self, reason: impl Into<String>) {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        inner.block = Some(BlockRecord {
            blocked_at: now,
            unblock_at: now + chrono::Duration::minutes(30),
            reason: reason.into(),
        });
        self.persist(&inner);
    }

    /// Purges an expired block record. Called by the periodic sweep.
    pub fn purge_expired_block(&self) {
        let mut inner = self.inner.lock();
        if let Some(block) = &inner.block {
            if !block.active() {
                inner.block = None;
                self.persist(&inner);
            }
        }
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
    fn add_credential_rejects_duplicate_secrets() {
        let (store, _file) = temp_store();
        store.add_credential("dup-secret".to_string()).unwrap();
        let err = store.add_credential("dup-secret".to_string()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSecret));
    }

    #[test]
    fn list_available_orders_by_creation() {
        let (store, _file) = temp_store();
        let a = store.add_credential("a".to_string()).unwrap();
        let b = store.add_credential("b".to_string()).unwrap();
        let available = store.list_available();
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].id, a);
        assert_eq!(available[1].id, b);
    }

    #[test]
    fn set_status_with_error_increments_error_count() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        store.set_status(id, CredentialStatus::Error, Some("boom".to_string())).unwrap();
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.error_count, 1);
        assert_eq!(credential.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn set_status_error_without_message_still_bumps_error_count() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        store.set_status(id, CredentialStatus::Error, None).unwrap();
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.status, CredentialStatus::Error);
        assert!(credential.error_count > 0);
    }

    #[test]
    fn set_status_without_error_clears_error_state() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        store.set_status(id, CredentialStatus::Error, Some("boom".to_string())).unwrap();
        store.set_status(id, CredentialStatus::Active, None).unwrap();
        let credential = store.get_credential(id).unwrap();
        assert_eq!(credential.error_count, 0);
        assert!(credential.last_error.is_none());
    }

    #[test]
    fn delete_removes_credential_and_usage() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        store.record_usage(id, true, "ok");
        store.delete_credential(id).unwrap();
        assert!(store.get_credential(id).is_none());
        assert!(store.recent_usage(id, 10).is_empty());
    }

    #[test]
    fn increment_calls_stamps_last_used() {
        let (store, _file) = temp_store();
        let id = store.add_credential("a".to_string()).unwrap();
        let count = store.increment_calls(id).unwrap();
        assert_eq!(count, 1);
        assert!(store.get_credential(id).unwrap().last_used_at.is_some());
    }

    #[test]
    fn proxy_pin_round_trips_and_clears() {
        let (store, _file) = temp_store();
        let id = store.add_proxy(ProxyScheme::Socks5, "127.0.0.1".to_string(), 1080);
        store.set_pin(id);
        assert!(store.pin().is_some());
        store.clear_pin();
        assert!(store.pin().is_none());
    }

    #[test]
    fn deleting_pinned_proxy_clears_pin() {
        let (store, _file) = temp_store();
        let id = store.add_proxy(ProxyScheme::Http, "127.0.0.1".to_string(), 8080);
        store.set_pin(id);
        store.delete_proxy(id).unwrap();
        assert!(store.pin().is_none());
    }

    #[test]
    fn block_record_is_active_until_unblock_time() {
        let (store, _file) = temp_store();
        store.set_block("busy");
        assert!(store.active_block().is_some());
    }

    #[test]
    fn state_persists_across_reload() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "").unwrap();
        let id = {
            let store = Store::load(file.path());
            store.add_credential("persisted-secret".to_string()).unwrap()
        };
        let reloaded = Store::load(file.path());
        assert!(reloaded.get_credential(id).is_some());
    }
}
