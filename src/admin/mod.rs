//! Admin Interface: thin JSON HTTP handlers over the Credential Registry
//! and Outbound-Proxy Registry, gated by the same bearer scheme as the
//! Client Gateway.
//!
//! # Usage
//! ```ignore
//! let admin_service = AdminService::new(engine.clone());
//! let admin_state = AdminState::new(config.admin_password.clone(), admin_service);
//! let admin_router = create_admin_router(admin_state);
//! ```

mod error;
mod handlers;
mod middleware;
mod router;
mod service;
pub mod types;

pub use middleware::AdminState;
pub use router::create_admin_router;
pub use service::AdminService;
