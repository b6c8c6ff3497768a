//! Authenticated caller identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one merchant (school tenant).
pub type MerchantId = Uuid;

/// Stable identifier of one authenticated user account.
pub type UserId = Uuid;

/// Staff role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator. May act across merchants.
    SuperAdmin,
    /// School administrator.
    Admin,
    /// Head of school; final reviewer of exams.
    Principal,
    Teacher,
    /// Fee desk staff.
    Accountant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Principal => "principal",
            Self::Teacher => "teacher",
            Self::Accountant => "accountant",
        }
    }
}

/// Parses a role from its stable string id.
pub fn parse_role(value: &str) -> Option<Role> {
    match value.trim() {
        "super_admin" => Some(Role::SuperAdmin),
        "admin" => Some(Role::Admin),
        "principal" => Some(Role::Principal),
        "teacher" => Some(Role::Teacher),
        "accountant" => Some(Role::Accountant),
        _ => None,
    }
}

/// The authenticated caller of one core operation.
///
/// Authentication itself happens outside core; callers hand in the resolved
/// identity. `merchant_id` is `None` only for platform-level accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub merchant_id: Option<MerchantId>,
    pub role: Role,
}

impl Principal {
    /// Creates a principal bound to one merchant.
    pub fn member(merchant_id: MerchantId, role: Role) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            merchant_id: Some(merchant_id),
            role,
        }
    }

    /// Creates a platform operator without merchant binding.
    pub fn platform() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            merchant_id: None,
            role: Role::SuperAdmin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_role, Role};

    #[test]
    fn role_ids_roundtrip() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Principal,
            Role::Teacher,
            Role::Accountant,
        ] {
            assert_eq!(parse_role(role.as_str()), Some(role));
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert_eq!(parse_role("janitor"), None);
        assert_eq!(parse_role("Admin"), None);
    }
}
