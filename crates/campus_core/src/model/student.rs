//! Student record.

use crate::model::validation::{
    optional_text, require_text, validate_phone, validate_record_code, ValidationResult,
};
use crate::tenant::MerchantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StudentId = Uuid;

/// One enrolled student of a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub uuid: StudentId,
    /// Owning merchant; `None` before first insert means "caller's merchant".
    pub merchant_id: Option<MerchantId>,
    /// Unique per merchant.
    pub admission_no: String,
    pub full_name: String,
    pub class_name: String,
    pub section: Option<String>,
    pub guardian_phone: Option<String>,
    /// Withdrawn students are tombstoned, never hard deleted.
    pub is_deleted: bool,
}

impl Student {
    pub fn new(
        admission_no: impl Into<String>,
        full_name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            admission_no: admission_no.into(),
            full_name: full_name.into(),
            class_name: class_name.into(),
            section: None,
            guardian_phone: None,
            is_deleted: false,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_record_code("admission_no", &self.admission_no)?;
        require_text("full_name", &self.full_name, 120)?;
        require_text("class_name", &self.class_name, 32)?;
        optional_text("section", self.section.as_deref(), 8)?;
        if let Some(phone) = self.guardian_phone.as_deref() {
            validate_phone("guardian_phone", phone)?;
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
