//! Daily attendance records and per-student summaries.
//!
//! # Invariants
//! - At most one record per `(merchant_id, student_id, date)`.
//! - `date` is an ISO calendar date.
//! - Attendance rate counts `Late` as attended.

use crate::model::student::StudentId;
use crate::model::validation::{optional_text, validate_iso_date, ValidationResult};
use crate::tenant::MerchantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    /// Absence with an accepted reason.
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Excused => "excused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            "excused" => Some(Self::Excused),
            _ => None,
        }
    }

    /// Whether the student was in school.
    pub fn is_attended(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub uuid: Uuid,
    pub merchant_id: Option<MerchantId>,
    pub student_id: StudentId,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

impl AttendanceRecord {
    pub fn new(student_id: StudentId, date: impl Into<String>, status: AttendanceStatus) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            student_id,
            date: date.into(),
            status,
            note: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_iso_date("date", &self.date)?;
        optional_text("note", self.note.as_deref(), 240)
    }
}

/// Attendance totals of one student over a date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
}

impl AttendanceSummary {
    /// Folds per-status counts into one summary.
    pub fn from_counts(counts: impl IntoIterator<Item = (AttendanceStatus, u32)>) -> Self {
        let mut summary = Self::default();
        for (status, count) in counts {
            let slot = match status {
                AttendanceStatus::Present => &mut summary.present,
                AttendanceStatus::Absent => &mut summary.absent,
                AttendanceStatus::Late => &mut summary.late,
                AttendanceStatus::Excused => &mut summary.excused,
            };
            *slot += count;
        }
        summary
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late + self.excused
    }

    /// Fraction of recorded days attended, `None` without records.
    pub fn attendance_rate(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(f64::from(self.present + self.late) / f64::from(total))
    }
}
