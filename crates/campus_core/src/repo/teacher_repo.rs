//! Teacher repository contracts and SQLite implementation.

use crate::model::teacher::{Teacher, TeacherId};
use crate::repo::{
    ensure_schema_ready, flag, map_write_error, normalize_list_limit, optional_text, parse_flag,
    parse_uuid, text, RepoError, RepoResult, ScopedQuery,
};
use crate::tenant::TenantContext;
use rusqlite::{params, Connection, Row};

const TEACHER_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    employee_no,
    full_name,
    email,
    is_deleted
FROM teachers";

pub trait TeacherRepository {
    fn create_teacher(&self, teacher: &Teacher) -> RepoResult<Teacher>;
    fn get_teacher(&self, id: TeacherId, include_deleted: bool) -> RepoResult<Option<Teacher>>;
    fn list_teachers(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<Teacher>>;
    fn update_teacher(&self, teacher: &Teacher) -> RepoResult<Teacher>;
    fn soft_delete_teacher(&self, id: TeacherId) -> RepoResult<()>;
}

pub struct SqliteTeacherRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteTeacherRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }
}

impl TeacherRepository for SqliteTeacherRepository<'_> {
    fn create_teacher(&self, teacher: &Teacher) -> RepoResult<Teacher> {
        teacher.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(teacher.merchant_id)?;

        self.conn
            .execute(
                "INSERT INTO teachers (uuid, merchant_id, employee_no, full_name, email, is_deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    teacher.uuid.to_string(),
                    merchant_id.to_string(),
                    teacher.employee_no.as_str(),
                    teacher.full_name.as_str(),
                    teacher.email.as_deref(),
                    teacher.is_deleted,
                ],
            )
            .map_err(|err| map_write_error(err, "employee number already in use"))?;

        Ok(Teacher {
            merchant_id: Some(merchant_id),
            ..teacher.clone()
        })
    }

    fn get_teacher(&self, id: TeacherId, include_deleted: bool) -> RepoResult<Option<Teacher>> {
        let mut query = ScopedQuery::select(TEACHER_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("uuid", text(id.to_string()));
        if !include_deleted {
            query = query.eq("is_deleted", flag(false));
        }
        query.fetch_optional(self.conn, parse_teacher_row)
    }

    fn list_teachers(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<Teacher>> {
        ScopedQuery::select(TEACHER_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("is_deleted", flag(false))
            .order_by("full_name ASC, uuid ASC")
            .limit(normalize_list_limit(limit), offset)
            .fetch_all(self.conn, parse_teacher_row)
    }

    fn update_teacher(&self, teacher: &Teacher) -> RepoResult<Teacher> {
        teacher.validate()?;
        let stored = self
            .get_teacher(teacher.uuid, true)?
            .and_then(|stored| stored.merchant_id)
            .ok_or(RepoError::NotFound {
                entity: "teacher",
                id: teacher.uuid,
            })?;
        let merchant_id =
            self.tenant
                .guard_update("teachers", teacher.uuid, stored, teacher.merchant_id)?;

        ScopedQuery::mutate(
            "UPDATE teachers
             SET
                employee_no = ?,
                full_name = ?,
                email = ?,
                is_deleted = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            vec![
                text(teacher.employee_no.as_str()),
                text(teacher.full_name.as_str()),
                optional_text(teacher.email.as_deref()),
                flag(teacher.is_deleted),
            ],
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(teacher.uuid.to_string()))
        .execute(self.conn)
        .map_err(|err| map_write_error(err, "employee number already in use"))?;

        Ok(Teacher {
            merchant_id: Some(merchant_id),
            ..teacher.clone()
        })
    }

    fn soft_delete_teacher(&self, id: TeacherId) -> RepoResult<()> {
        let changed = ScopedQuery::mutate(
            "UPDATE teachers SET is_deleted = 1, updated_at = (strftime('%s', 'now') * 1000)",
            Vec::new(),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .execute(self.conn)?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "teacher",
                id,
            });
        }
        Ok(())
    }
}

fn parse_teacher_row(row: &Row<'_>) -> RepoResult<Teacher> {
    let uuid_text: String = row.get("uuid")?;
    let merchant_text: String = row.get("merchant_id")?;
    Ok(Teacher {
        uuid: parse_uuid(&uuid_text, "teachers.uuid")?,
        merchant_id: Some(parse_uuid(&merchant_text, "teachers.merchant_id")?),
        employee_no: row.get("employee_no")?,
        full_name: row.get("full_name")?,
        email: row.get("email")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "teachers.is_deleted")?,
    })
}
