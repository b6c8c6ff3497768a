//! Issued certificate records.
//!
//! Rendering is out of core; this is the register of what was issued.

use crate::model::student::StudentId;
use crate::model::validation::{optional_text, ValidationResult};
use crate::tenant::{MerchantId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CertificateId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
    Bonafide,
    Character,
    /// School leaving certificate.
    Transfer,
    Completion,
}

impl CertificateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bonafide => "bonafide",
            Self::Character => "character",
            Self::Transfer => "transfer",
            Self::Completion => "completion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bonafide" => Some(Self::Bonafide),
            "character" => Some(Self::Character),
            "transfer" => Some(Self::Transfer),
            "completion" => Some(Self::Completion),
            _ => None,
        }
    }

    fn serial_prefix(self) -> &'static str {
        match self {
            Self::Bonafide => "BON",
            Self::Character => "CHR",
            Self::Transfer => "TC",
            Self::Completion => "CMP",
        }
    }
}

/// Formats the per-merchant, per-kind serial number.
pub fn format_serial(kind: CertificateKind, seq: i64) -> String {
    format!("{}-{seq:04}", kind.serial_prefix())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub uuid: CertificateId,
    pub merchant_id: Option<MerchantId>,
    pub student_id: StudentId,
    pub kind: CertificateKind,
    /// Assigned on insert.
    pub serial_no: Option<String>,
    pub remarks: Option<String>,
    pub issued_by: UserId,
    pub issued_at: Option<i64>,
    pub revoked_at: Option<i64>,
}

impl Certificate {
    pub fn new(student_id: StudentId, kind: CertificateKind, issued_by: UserId) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            student_id,
            kind,
            serial_no: None,
            remarks: None,
            issued_by,
            issued_at: None,
            revoked_at: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        optional_text("remarks", self.remarks.as_deref(), 500)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{format_serial, CertificateKind};

    #[test]
    fn serials_carry_kind_prefix() {
        assert_eq!(format_serial(CertificateKind::Transfer, 12), "TC-0012");
        assert_eq!(format_serial(CertificateKind::Bonafide, 1), "BON-0001");
    }
}
