//! Teacher record.

use crate::model::validation::{
    require_text, validate_email, validate_record_code, ValidationResult,
};
use crate::tenant::MerchantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TeacherId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub uuid: TeacherId,
    pub merchant_id: Option<MerchantId>,
    /// Unique per merchant.
    pub employee_no: String,
    pub full_name: String,
    pub email: Option<String>,
    pub is_deleted: bool,
}

impl Teacher {
    pub fn new(employee_no: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            employee_no: employee_no.into(),
            full_name: full_name.into(),
            email: None,
            is_deleted: false,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_record_code("employee_no", &self.employee_no)?;
        require_text("full_name", &self.full_name, 120)?;
        if let Some(email) = self.email.as_deref() {
            validate_email("email", email)?;
        }
        Ok(())
    }
}
