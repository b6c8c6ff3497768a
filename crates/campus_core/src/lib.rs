//! Core domain logic for a multi-tenant school backend.
//! This crate is the single source of truth for business invariants:
//! tenant isolation, exam review workflows and fee arithmetic.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tenant;

pub use config::{load_config, ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::review::{ReviewAction, ReviewState, ReviewStatus, ReviewSubject, TransitionError};
pub use repo::{RepoError, RepoResult};
pub use service::{ServiceError, ServiceResult};
pub use tenant::{
    MerchantId, Permission, Principal, Role, ScopePolicy, TenantContext, TenantError, TenantScope,
    UserId,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
