//! Admin API error type definitions.

use std::fmt;

use axum::http::StatusCode;

use crate::registry::RegistryError;

use super::types::AdminErrorResponse;

/// Errors surfaced by admin handlers, distinct from `RegistryError` so the
/// HTTP layer can attach request-validation failures the registry never
/// needs to express.
#[derive(Debug)]
pub enum AdminServiceError {
    NotFound(String),
    InvalidRequest(String),
    Internal(String),
}

impl fmt::Display for AdminServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminServiceError::NotFound(msg) => write!(f, "not found: {msg}"),
            AdminServiceError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            AdminServiceError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AdminServiceError {}

impl From<RegistryError> for AdminServiceError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::DuplicateSecret => AdminServiceError::InvalidRequest(e.to_string()),
            RegistryError::CredentialNotFound(_) | RegistryError::ProxyNotFound(_) => {
                AdminServiceError::NotFound(e.to_string())
            }
        }
    }
}

impl AdminServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AdminServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> AdminErrorResponse {
        match &self {
            AdminServiceError::NotFound(_) => AdminErrorResponse::not_found(self.to_string()),
            AdminServiceError::InvalidRequest(_) => AdminErrorResponse::invalid_request(self.to_string()),
            AdminServiceError::Internal(_) => AdminErrorResponse::internal_error(self.to_string()),
        }
    }
}
