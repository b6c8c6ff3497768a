//! Merchant (school tenant) record.

use crate::model::validation::{require_text, ValidationError, ValidationResult};
use crate::tenant::MerchantId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static MERCHANT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9-]{2,16}$").expect("valid merchant code regex"));

/// One school onboarded on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub uuid: MerchantId,
    /// Short unique code, uppercase.
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

impl Merchant {
    /// Creates an active merchant with normalized code.
    pub fn new(code: &str, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            code: normalize_merchant_code(code),
            name: name.into(),
            is_active: true,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        if !MERCHANT_CODE_RE.is_match(&self.code) {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                value: self.code.clone(),
            });
        }
        require_text("name", &self.name, 160)
    }
}

/// Uppercases and trims a merchant code.
pub fn normalize_merchant_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
