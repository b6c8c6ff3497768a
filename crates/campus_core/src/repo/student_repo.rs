//! Student repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Default reads hide withdrawn (`is_deleted=1`) students.
//! - `admission_no` is unique per merchant; duplicates map to `Conflict`.
//! - Listing is deterministic: `class_name ASC, full_name ASC, uuid ASC`.

use crate::model::student::{Student, StudentId};
use crate::repo::{
    ensure_schema_ready, flag, map_write_error, normalize_list_limit, optional_text, parse_flag,
    parse_uuid, text, RepoError, RepoResult, ScopedQuery,
};
use crate::tenant::TenantContext;
use rusqlite::{params, Connection, Row};

const STUDENT_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    admission_no,
    full_name,
    class_name,
    section,
    guardian_phone,
    is_deleted
FROM students";

/// Query options for listing students.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentListQuery {
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub include_deleted: bool,
    /// Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait StudentRepository {
    fn create_student(&self, student: &Student) -> RepoResult<Student>;
    fn get_student(&self, id: StudentId, include_deleted: bool) -> RepoResult<Option<Student>>;
    fn list_students(&self, query: &StudentListQuery) -> RepoResult<Vec<Student>>;
    fn update_student(&self, student: &Student) -> RepoResult<Student>;
    fn soft_delete_student(&self, id: StudentId) -> RepoResult<()>;
}

pub struct SqliteStudentRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteStudentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }
}

impl StudentRepository for SqliteStudentRepository<'_> {
    fn create_student(&self, student: &Student) -> RepoResult<Student> {
        student.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(student.merchant_id)?;

        self.conn
            .execute(
                "INSERT INTO students (
                    uuid,
                    merchant_id,
                    admission_no,
                    full_name,
                    class_name,
                    section,
                    guardian_phone,
                    is_deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    student.uuid.to_string(),
                    merchant_id.to_string(),
                    student.admission_no.as_str(),
                    student.full_name.as_str(),
                    student.class_name.as_str(),
                    student.section.as_deref(),
                    student.guardian_phone.as_deref(),
                    student.is_deleted,
                ],
            )
            .map_err(|err| map_write_error(err, "admission number already in use"))?;

        Ok(Student {
            merchant_id: Some(merchant_id),
            ..student.clone()
        })
    }

    fn get_student(&self, id: StudentId, include_deleted: bool) -> RepoResult<Option<Student>> {
        let mut query = ScopedQuery::select(STUDENT_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("uuid", text(id.to_string()));
        if !include_deleted {
            query = query.eq("is_deleted", flag(false));
        }
        query.fetch_optional(self.conn, parse_student_row)
    }

    fn list_students(&self, query: &StudentListQuery) -> RepoResult<Vec<Student>> {
        let mut scoped = ScopedQuery::select(STUDENT_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq_opt("class_name", query.class_name.clone().map(text))
            .eq_opt("section", query.section.clone().map(text));
        if !query.include_deleted {
            scoped = scoped.eq("is_deleted", flag(false));
        }
        scoped
            .order_by("class_name ASC, full_name ASC, uuid ASC")
            .limit(normalize_list_limit(query.limit), query.offset)
            .fetch_all(self.conn, parse_student_row)
    }

    fn update_student(&self, student: &Student) -> RepoResult<Student> {
        student.validate()?;
        let stored = self
            .get_student(student.uuid, true)?
            .ok_or(RepoError::NotFound {
                entity: "student",
                id: student.uuid,
            })?;
        let stored_merchant = stored.merchant_id.ok_or_else(|| {
            RepoError::InvalidData(format!("student {} has no merchant", student.uuid))
        })?;
        let merchant_id =
            self.tenant
                .guard_update("students", student.uuid, stored_merchant, student.merchant_id)?;

        let changed = ScopedQuery::mutate(
            "UPDATE students
             SET
                admission_no = ?,
                full_name = ?,
                class_name = ?,
                section = ?,
                guardian_phone = ?,
                is_deleted = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            vec![
                text(student.admission_no.as_str()),
                text(student.full_name.as_str()),
                text(student.class_name.as_str()),
                optional_text(student.section.as_deref()),
                optional_text(student.guardian_phone.as_deref()),
                flag(student.is_deleted),
            ],
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(student.uuid.to_string()))
        .execute(self.conn)
        .map_err(|err| map_write_error(err, "admission number already in use"))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "student",
                id: student.uuid,
            });
        }

        Ok(Student {
            merchant_id: Some(merchant_id),
            ..student.clone()
        })
    }

    fn soft_delete_student(&self, id: StudentId) -> RepoResult<()> {
        let changed = ScopedQuery::mutate(
            "UPDATE students
             SET is_deleted = 1, updated_at = (strftime('%s', 'now') * 1000)",
            Vec::new(),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .execute(self.conn)?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "student",
                id,
            });
        }
        Ok(())
    }
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let uuid_text: String = row.get("uuid")?;
    let merchant_text: String = row.get("merchant_id")?;

    let student = Student {
        uuid: parse_uuid(&uuid_text, "students.uuid")?,
        merchant_id: Some(parse_uuid(&merchant_text, "students.merchant_id")?),
        admission_no: row.get("admission_no")?,
        full_name: row.get("full_name")?,
        class_name: row.get("class_name")?,
        section: row.get("section")?,
        guardian_phone: row.get("guardian_phone")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "students.is_deleted")?,
    };
    student.validate()?;
    Ok(student)
}
