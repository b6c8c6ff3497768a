//! Row-level tenant scoping.
//!
//! # Responsibility
//! - Render the `merchant_id = ?` predicate injected into every read,
//!   update and delete.
//! - Resolve the owning merchant of new rows from the caller.
//! - Guard `merchant_id` against reassignment on update.
//!
//! # Invariants
//! - `Global` is only reachable from a `SuperAdmin` principal without
//!   merchant binding.
//! - A merchant-scoped caller cannot insert rows for another merchant.
//! - With `ScopePolicy::debug` a reassignment attempt fails; otherwise it is
//!   logged and the stored merchant is kept.

use super::principal::{MerchantId, Principal, Role};
use log::warn;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Behavior switches for tenant enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopePolicy {
    /// Reject `merchant_id` reassignment instead of logging and ignoring it.
    pub debug: bool,
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self {
            debug: cfg!(debug_assertions),
        }
    }
}

/// Tenant enforcement errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// Caller has no merchant and is not allowed the global view, or a global
    /// caller inserted without naming a merchant.
    MissingTenant,
    /// Scoped caller attempted to create a row for another merchant.
    CrossTenantWrite {
        scope: MerchantId,
        requested: MerchantId,
    },
    /// Update attempted to move a row to another merchant.
    Reassignment {
        table: &'static str,
        record_id: Uuid,
        stored: MerchantId,
        requested: MerchantId,
    },
}

impl Display for TenantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTenant => write!(f, "operation requires a merchant context"),
            Self::CrossTenantWrite { scope, requested } => write!(
                f,
                "caller scoped to merchant {scope} cannot write rows of merchant {requested}"
            ),
            Self::Reassignment {
                table,
                record_id,
                stored,
                requested,
            } => write!(
                f,
                "refusing to move {table} row {record_id} from merchant {stored} to {requested}"
            ),
        }
    }
}

impl Error for TenantError {}

/// Row visibility of one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    Merchant(MerchantId),
    Global,
}

impl TenantScope {
    /// Derives the scope of an authenticated principal.
    pub fn for_principal(principal: &Principal) -> Result<Self, TenantError> {
        match (principal.merchant_id, principal.role) {
            (Some(merchant_id), _) => Ok(Self::Merchant(merchant_id)),
            (None, Role::SuperAdmin) => Ok(Self::Global),
            (None, _) => Err(TenantError::MissingTenant),
        }
    }

    /// Returns the bound merchant, `None` for the global view.
    pub fn merchant(&self) -> Option<MerchantId> {
        match self {
            Self::Merchant(merchant_id) => Some(*merchant_id),
            Self::Global => None,
        }
    }

    /// Returns whether rows of `merchant_id` are visible in this scope.
    pub fn contains(&self, merchant_id: MerchantId) -> bool {
        match self {
            Self::Merchant(own) => *own == merchant_id,
            Self::Global => true,
        }
    }

    /// Renders the predicate for `column`, or `None` when unscoped.
    ///
    /// The clause carries exactly one positional placeholder.
    pub fn predicate(&self, column: &str) -> Option<(String, Value)> {
        self.merchant()
            .map(|merchant_id| (format!("{column} = ?"), Value::Text(merchant_id.to_string())))
    }

    /// Resolves the owning merchant of a new row.
    ///
    /// An absent merchant is filled from the scope.
    pub fn resolve_insert(&self, requested: Option<MerchantId>) -> Result<MerchantId, TenantError> {
        match (self, requested) {
            (Self::Merchant(own), None) => Ok(*own),
            (Self::Merchant(own), Some(requested)) if *own == requested => Ok(requested),
            (Self::Merchant(own), Some(requested)) => Err(TenantError::CrossTenantWrite {
                scope: *own,
                requested,
            }),
            (Self::Global, Some(requested)) => Ok(requested),
            (Self::Global, None) => Err(TenantError::MissingTenant),
        }
    }
}

/// Scope plus enforcement policy handed to every repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub scope: TenantScope,
    pub policy: ScopePolicy,
}

impl TenantContext {
    pub fn new(scope: TenantScope, policy: ScopePolicy) -> Self {
        Self { scope, policy }
    }

    /// Builds the context of one principal.
    pub fn for_principal(principal: &Principal, policy: ScopePolicy) -> Result<Self, TenantError> {
        Ok(Self::new(TenantScope::for_principal(principal)?, policy))
    }

    /// Merchant-scoped context with default policy.
    pub fn merchant(merchant_id: MerchantId) -> Self {
        Self::new(TenantScope::Merchant(merchant_id), ScopePolicy::default())
    }

    /// Decides the merchant an updated row keeps.
    ///
    /// `requested = None` means the caller did not touch `merchant_id`.
    pub fn guard_update(
        &self,
        table: &'static str,
        record_id: Uuid,
        stored: MerchantId,
        requested: Option<MerchantId>,
    ) -> Result<MerchantId, TenantError> {
        let Some(requested) = requested.filter(|requested| *requested != stored) else {
            return Ok(stored);
        };

        if self.policy.debug {
            return Err(TenantError::Reassignment {
                table,
                record_id,
                stored,
                requested,
            });
        }

        warn!(
            "event=tenant_reassignment_ignored module=tenant status=warn table={} record_id={} stored={} requested={}",
            table, record_id, stored, requested
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::{ScopePolicy, TenantContext, TenantError, TenantScope};
    use crate::tenant::principal::{Principal, Role};
    use rusqlite::types::Value;
    use uuid::Uuid;

    #[test]
    fn member_principal_is_scoped_to_its_merchant() {
        let merchant = Uuid::new_v4();
        let scope = TenantScope::for_principal(&Principal::member(merchant, Role::Teacher))
            .expect("member scope");
        assert_eq!(scope, TenantScope::Merchant(merchant));
        assert!(scope.contains(merchant));
        assert!(!scope.contains(Uuid::new_v4()));
    }

    #[test]
    fn only_platform_super_admin_gets_global_scope() {
        let scope = TenantScope::for_principal(&Principal::platform()).expect("global scope");
        assert_eq!(scope, TenantScope::Global);

        let orphan = Principal {
            user_id: Uuid::new_v4(),
            merchant_id: None,
            role: Role::Admin,
        };
        assert_eq!(
            TenantScope::for_principal(&orphan),
            Err(TenantError::MissingTenant)
        );
    }

    #[test]
    fn predicate_binds_merchant_and_is_absent_for_global() {
        let merchant = Uuid::new_v4();
        let (clause, value) = TenantScope::Merchant(merchant)
            .predicate("s.merchant_id")
            .expect("scoped predicate");
        assert_eq!(clause, "s.merchant_id = ?");
        assert_eq!(value, Value::Text(merchant.to_string()));
        assert!(TenantScope::Global.predicate("merchant_id").is_none());
    }

    #[test]
    fn insert_fills_absent_merchant_and_blocks_cross_tenant_writes() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = TenantScope::Merchant(own);

        assert_eq!(scope.resolve_insert(None), Ok(own));
        assert_eq!(scope.resolve_insert(Some(own)), Ok(own));
        assert_eq!(
            scope.resolve_insert(Some(other)),
            Err(TenantError::CrossTenantWrite {
                scope: own,
                requested: other
            })
        );

        assert_eq!(TenantScope::Global.resolve_insert(Some(other)), Ok(other));
        assert_eq!(
            TenantScope::Global.resolve_insert(None),
            Err(TenantError::MissingTenant)
        );
    }

    #[test]
    fn reassignment_is_rejected_in_debug_and_ignored_otherwise() {
        let stored = Uuid::new_v4();
        let requested = Uuid::new_v4();
        let record = Uuid::new_v4();

        let strict = TenantContext::new(TenantScope::Global, ScopePolicy { debug: true });
        let err = strict
            .guard_update("students", record, stored, Some(requested))
            .expect_err("debug policy must reject reassignment");
        assert!(matches!(err, TenantError::Reassignment { table: "students", .. }));

        let lenient = TenantContext::new(TenantScope::Global, ScopePolicy { debug: false });
        assert_eq!(
            lenient.guard_update("students", record, stored, Some(requested)),
            Ok(stored)
        );
    }

    #[test]
    fn unchanged_merchant_passes_under_any_policy() {
        let stored = Uuid::new_v4();
        let strict = TenantContext::new(TenantScope::Merchant(stored), ScopePolicy { debug: true });
        assert_eq!(
            strict.guard_update("teachers", Uuid::new_v4(), stored, Some(stored)),
            Ok(stored)
        );
        assert_eq!(
            strict.guard_update("teachers", Uuid::new_v4(), stored, None),
            Ok(stored)
        );
    }
}
