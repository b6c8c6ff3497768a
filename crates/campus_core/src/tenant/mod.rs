//! Tenant isolation primitives.
//!
//! # Responsibility
//! - Describe the authenticated caller (`Principal`) supplied by outer layers.
//! - Derive the row scope (`TenantScope`) every repository query runs under.
//! - Enforce the role permission policy before writes.
//!
//! # Invariants
//! - A merchant-scoped caller never reads, updates or deletes another
//!   merchant's rows.
//! - Inserts always resolve to exactly one merchant.
//! - Only `SuperAdmin` without a merchant gets the unscoped `Global` view.

pub mod policy;
pub mod principal;
pub mod scope;

pub use policy::{require, Permission, PolicyError};
pub use principal::{parse_role, MerchantId, Principal, Role, UserId};
pub use scope::{ScopePolicy, TenantContext, TenantError, TenantScope};
