//! Attendance marking use-cases.
//!
//! # Invariants
//! - Only students active in the caller's scope can be marked.
//! - A roll call is applied entirely or not at all.

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::model::student::{Student, StudentId};
use crate::model::validation::{validate_date_order, validate_iso_date};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::student_repo::StudentRepository;
use crate::service::{authorize, found, ServiceResult};
use crate::tenant::{Permission, Principal};
use log::info;

/// One line of a class roll call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollCallEntry {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

impl RollCallEntry {
    pub fn new(student_id: StudentId, status: AttendanceStatus) -> Self {
        Self {
            student_id,
            status,
            note: None,
        }
    }
}

pub struct AttendanceService<A: AttendanceRepository, S: StudentRepository> {
    attendance: A,
    students: S,
    principal: Principal,
}

impl<A: AttendanceRepository, S: StudentRepository> AttendanceService<A, S> {
    pub fn new(attendance: A, students: S, principal: Principal) -> Self {
        Self {
            attendance,
            students,
            principal,
        }
    }

    /// Marks one student on one date; re-marking replaces the status.
    pub fn mark(
        &self,
        student_id: StudentId,
        date: &str,
        status: AttendanceStatus,
        note: Option<&str>,
    ) -> ServiceResult<AttendanceRecord> {
        authorize(&self.principal, Permission::RecordAttendance)?;
        validate_iso_date("date", date)?;
        let student = self.require_active_student(student_id)?;

        let mut record = AttendanceRecord::new(student_id, date, status);
        record.merchant_id = student.merchant_id;
        record.note = note.map(str::to_string);
        Ok(self.attendance.upsert_attendance(&record)?)
    }

    /// Applies a whole roll call for `date`.
    pub fn mark_many(
        &self,
        date: &str,
        entries: &[RollCallEntry],
    ) -> ServiceResult<Vec<AttendanceRecord>> {
        authorize(&self.principal, Permission::RecordAttendance)?;
        validate_iso_date("date", date)?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let student = self.require_active_student(entry.student_id)?;
            let mut record = AttendanceRecord::new(entry.student_id, date, entry.status);
            record.merchant_id = student.merchant_id;
            record.note = entry.note.clone();
            records.push(record);
        }

        let stored = self.attendance.upsert_many(&records)?;
        info!(
            "event=attendance_roll_call module=service status=ok date={} count={}",
            date,
            stored.len()
        );
        Ok(stored)
    }

    pub fn list_for_date(
        &self,
        date: &str,
        class_name: Option<&str>,
    ) -> ServiceResult<Vec<AttendanceRecord>> {
        validate_iso_date("date", date)?;
        Ok(self.attendance.list_for_date(date, class_name)?)
    }

    pub fn list_for_student(
        &self,
        student_id: StudentId,
        from: &str,
        to: &str,
    ) -> ServiceResult<Vec<AttendanceRecord>> {
        validate_range(from, to)?;
        Ok(self.attendance.list_for_student(student_id, from, to)?)
    }

    /// Counts per status over an inclusive range.
    pub fn summary(
        &self,
        student_id: StudentId,
        from: &str,
        to: &str,
    ) -> ServiceResult<AttendanceSummary> {
        validate_range(from, to)?;
        let counts = self.attendance.count_by_status(student_id, from, to)?;
        Ok(AttendanceSummary::from_counts(counts))
    }

    fn require_active_student(&self, student_id: StudentId) -> ServiceResult<Student> {
        found(
            self.students.get_student(student_id, false)?,
            "student",
            student_id,
        )
    }
}

fn validate_range(from: &str, to: &str) -> ServiceResult<()> {
    validate_iso_date("from", from)?;
    validate_iso_date("to", to)?;
    validate_date_order("range", from, to)?;
    Ok(())
}
