//! Attendance repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Marking is an upsert on `(merchant_id, student_id, date)`; the first
//!   record's `uuid` is kept on re-mark.
//! - `upsert_many` applies a whole roll call or nothing.

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::student::StudentId;
use crate::repo::{
    ensure_owned, ensure_schema_ready, map_write_error, parse_enum, parse_uuid, text, RepoError,
    RepoResult, ScopedQuery,
};
use crate::tenant::{MerchantId, TenantContext, TenantScope};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    a.uuid AS uuid,
    a.merchant_id AS merchant_id,
    a.student_id AS student_id,
    a.date AS date,
    a.status AS status,
    a.note AS note
FROM attendance_records a
INNER JOIN students s ON s.uuid = a.student_id";

pub trait AttendanceRepository {
    /// Inserts or replaces the record of one student on one date.
    fn upsert_attendance(&self, record: &AttendanceRecord) -> RepoResult<AttendanceRecord>;
    /// Upserts a batch atomically.
    fn upsert_many(&self, records: &[AttendanceRecord]) -> RepoResult<Vec<AttendanceRecord>>;
    fn list_for_date(&self, date: &str, class_name: Option<&str>)
        -> RepoResult<Vec<AttendanceRecord>>;
    fn list_for_student(
        &self,
        student_id: StudentId,
        from: &str,
        to: &str,
    ) -> RepoResult<Vec<AttendanceRecord>>;
    /// Counts records per status in an inclusive date range.
    fn count_by_status(
        &self,
        student_id: StudentId,
        from: &str,
        to: &str,
    ) -> RepoResult<Vec<(AttendanceStatus, u32)>>;
}

pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }

    fn upsert_on(
        &self,
        conn: &Connection,
        record: &AttendanceRecord,
    ) -> RepoResult<AttendanceRecord> {
        record.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(record.merchant_id)?;
        ensure_owned(conn, "students", "student", record.student_id, merchant_id)?;

        conn.execute(
            "INSERT INTO attendance_records (uuid, merchant_id, student_id, date, status, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (merchant_id, student_id, date) DO UPDATE SET
                status = excluded.status,
                note = excluded.note,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                record.uuid.to_string(),
                merchant_id.to_string(),
                record.student_id.to_string(),
                record.date.as_str(),
                record.status.as_str(),
                record.note.as_deref(),
            ],
        )
        .map_err(|err| map_write_error(err, "attendance student reference"))?;

        load_one(conn, merchant_id, record.student_id, &record.date)?.ok_or(
            RepoError::NotFound {
                entity: "attendance record",
                id: record.uuid,
            },
        )
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn upsert_attendance(&self, record: &AttendanceRecord) -> RepoResult<AttendanceRecord> {
        self.upsert_on(self.conn, record)
    }

    fn upsert_many(&self, records: &[AttendanceRecord]) -> RepoResult<Vec<AttendanceRecord>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            stored.push(self.upsert_on(&tx, record)?);
        }
        tx.commit()?;
        Ok(stored)
    }

    fn list_for_date(
        &self,
        date: &str,
        class_name: Option<&str>,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        ScopedQuery::select(ATTENDANCE_SELECT_SQL, "a.merchant_id", &self.tenant.scope)
            .eq("a.date", text(date))
            .eq_opt("s.class_name", class_name.map(text))
            .order_by("s.class_name ASC, s.full_name ASC, a.uuid ASC")
            .fetch_all(self.conn, parse_attendance_row)
    }

    fn list_for_student(
        &self,
        student_id: StudentId,
        from: &str,
        to: &str,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        ScopedQuery::select(ATTENDANCE_SELECT_SQL, "a.merchant_id", &self.tenant.scope)
            .eq("a.student_id", text(student_id.to_string()))
            .and("a.date BETWEEN ? AND ?", [text(from), text(to)])
            .order_by("a.date ASC")
            .fetch_all(self.conn, parse_attendance_row)
    }

    fn count_by_status(
        &self,
        student_id: StudentId,
        from: &str,
        to: &str,
    ) -> RepoResult<Vec<(AttendanceStatus, u32)>> {
        ScopedQuery::select(
            "SELECT status, COUNT(*) AS n FROM attendance_records",
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("student_id", text(student_id.to_string()))
        .and("date BETWEEN ? AND ?", [text(from), text(to)])
        .group_by("status")
        .fetch_all(self.conn, |row| {
            let status_text: String = row.get("status")?;
            let status = parse_enum(
                &status_text,
                "attendance_records.status",
                AttendanceStatus::parse,
            )?;
            let count: u32 = row.get("n")?;
            Ok((status, count))
        })
    }
}

fn load_one(
    conn: &Connection,
    merchant_id: MerchantId,
    student_id: StudentId,
    date: &str,
) -> RepoResult<Option<AttendanceRecord>> {
    ScopedQuery::select(
        ATTENDANCE_SELECT_SQL,
        "a.merchant_id",
        &TenantScope::Merchant(merchant_id),
    )
    .eq("a.student_id", text(student_id.to_string()))
    .eq("a.date", text(date))
    .fetch_optional(conn, parse_attendance_row)
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let uuid_text: String = row.get("uuid")?;
    let merchant_text: String = row.get("merchant_id")?;
    let student_text: String = row.get("student_id")?;
    let status_text: String = row.get("status")?;

    let record = AttendanceRecord {
        uuid: parse_uuid(&uuid_text, "attendance_records.uuid")?,
        merchant_id: Some(parse_uuid(&merchant_text, "attendance_records.merchant_id")?),
        student_id: parse_uuid(&student_text, "attendance_records.student_id")?,
        date: row.get("date")?,
        status: parse_enum(&status_text, "attendance_records.status", AttendanceStatus::parse)?,
        note: row.get("note")?,
    };
    record.validate()?;
    Ok(record)
}
