//! Admin API business logic.
//!
//! Thin wrapper over the Request Engine's shared `Store` and transport
//! caches, keeping HTTP concerns out of the registry and registry concerns
//! out of the handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::balance;
use crate::engine::Engine;
use crate::proxy_selector::{self, VerificationResult};
use crate::registry::CredentialStatus;

use super::error::AdminServiceError;
use super::types::{
    AddCredentialRequest, AddCredentialResponse, AddProxyRequest, AddProxyResponse,
    CredentialView, CredentialsListResponse, HealthResponse, ProxyView, UsageListResponse,
    VerifyProxyResponse,
};

const PROXY_VERIFY_TIMEOUT: Duration = Duration::from_secs(8);

pub struct AdminService {
    engine: Arc<Engine>,
}

impl AdminService {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn list_credentials(&self) -> CredentialsListResponse {
        let credentials = self.engine.store().list_credentials();
        let available = credentials.iter().filter(|c| c.available && c.status == CredentialStatus::Active).count();
        CredentialsListResponse {
            total: credentials.len(),
            available,
            credentials: credentials.into_iter().map(CredentialView::from).collect(),
        }
    }

    pub fn get_credential(&self, id: u64) -> Result<CredentialView, AdminServiceError> {
        self.engine
            .store()
            .get_credential(id)
            .map(CredentialView::from)
            .ok_or_else(|| AdminServiceError::NotFound(format!("credential {id} not found")))
    }

    pub fn add_credential(&self, req: AddCredentialRequest) -> Result<AddCredentialResponse, AdminServiceError> {
        if req.secret.trim().is_empty() {
            return Err(AdminServiceError::InvalidRequest("secret must not be empty".to_string()));
        }
        let id = self.engine.store().add_credential(req.secret)?;
        Ok(AddCredentialResponse { id })
    }

    pub fn delete_credential(&self, id: u64) -> Result<(), AdminServiceError> {
        self.engine.store().delete_credential(id)?;
        Ok(())
    }

    pub fn set_availability(&self, id: u64, available: bool) -> Result<(), AdminServiceError> {
        self.engine.store().set_availability(id, available)?;
        Ok(())
    }

    pub fn set_status(&self, id: u64, status: CredentialStatus) -> Result<(), AdminServiceError> {
        self.engine.store().set_status(id, status, None)?;
        Ok(())
    }

    pub fn list_usage(&self, id: u64, limit: usize) -> UsageListResponse {
        UsageListResponse { entries: self.engine.store().recent_usage(id, limit) }
    }

    pub fn list_proxies(&self) -> Vec<ProxyView> {
        self.engine.store().list_proxies().into_iter().map(ProxyView::from).collect()
    }

    pub fn add_proxy(&self, req: AddProxyRequest) -> AddProxyResponse {
        let id = self.engine.store().add_proxy(req.scheme, req.host, req.port);
        AddProxyResponse { id }
    }

    pub fn delete_proxy(&self, id: u64) -> Result<(), AdminServiceError> {
        self.engine.store().delete_proxy(id)?;
        self.engine.proxy_clients().invalidate(id);
        Ok(())
    }

    pub fn set_proxy_enabled(&self, id: u64, enabled: bool) -> Result<(), AdminServiceError> {
        self.engine.store().set_proxy_enabled(id, enabled)?;
        Ok(())
    }

    /// Dispatches a connectivity probe through the named proxy and records
    /// the result on the registry entry.
    pub async fn verify_proxy(&self, id: u64) -> Result<VerifyProxyResponse, AdminServiceError> {
        let proxy = self
            .engine
            .store()
            .get_proxy(id)
            .ok_or_else(|| AdminServiceError::NotFound(format!("proxy {id} not found")))?;

        let client = self
            .engine
            .proxy_clients()
            .get_or_build(&proxy, PROXY_VERIFY_TIMEOUT)
            .map_err(|e| AdminServiceError::Internal(e.to_string()))?;

        let VerificationResult { reachable, ip, location, latency_ms } = proxy_selector::verify(&client).await;

        self.engine.store().record_proxy_verification(id, ip.clone(), location.clone(), latency_ms)?;

        Ok(VerifyProxyResponse { reachable, ip, location, latency_ms })
    }

    /// Force a balance probe against a credential's secret directly,
    /// bypassing the `AUTO_QUERY_BALANCE_AFTER_CALLS` cadence.
    pub async fn refresh_balance(&self, id: u64) -> Result<CredentialView, AdminServiceError> {
        let credential = self
            .engine
            .store()
            .get_credential(id)
            .ok_or_else(|| AdminServiceError::NotFound(format!("credential {id} not found")))?;

        let probe = balance::probe(self.engine.direct_client(), &credential.secret).await;
        if let Some(balance) = probe.balance {
            crate::availability::apply_balance(self.engine.store(), id, balance);
        }

        self.get_credential(id)
    }

    pub fn health(&self) -> HealthResponse {
        let credentials = self.engine.store().list_credentials();
        let available = credentials.iter().filter(|c| c.available && c.status == CredentialStatus::Active).count();
        HealthResponse {
            status: "ok",
            credential_count: credentials.len(),
            available_credential_count: available,
            proxy_mode_enabled: self.engine.store().proxy_mode_enabled(),
            ip_blocked: self.engine.store().active_block().is_some(),
        }
    }

    /// Toggle proxy mode globally, whether the engine considers the
    /// outbound-proxy registry at all when dispatching.
    pub fn set_proxy_mode_enabled(&self, enabled: bool) {
        self.engine.store().set_proxy_mode_enabled(enabled);
    }
}
