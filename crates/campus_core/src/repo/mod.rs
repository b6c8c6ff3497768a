//! Tenant-scoped repositories over SQLite.
//!
//! # Responsibility
//! - Provide use-case oriented data access for every school record.
//! - Route every read, update and delete through [`ScopedQuery`] so the
//!   caller's merchant predicate is always present.
//! - Resolve `merchant_id` of inserted rows from the caller's scope.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Rows of another merchant surface as "not found", never as data.

use crate::db::migrations::latest_version;
use crate::db::{schema_version, DbError};
use crate::model::validation::ValidationError;
use crate::tenant::{MerchantId, TenantError};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod attendance_repo;
pub mod certificate_repo;
pub mod exam_repo;
pub mod invoice_repo;
pub mod merchant_repo;
mod scoped;
pub mod student_repo;
pub mod teacher_repo;

pub use scoped::ScopedQuery;

const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all school record repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(ValidationError),
    Tenant(TenantError),
    /// Record does not exist in the caller's scope.
    NotFound { entity: &'static str, id: Uuid },
    /// Unique or state constraint rejected the write.
    Conflict(String),
    InvalidData(String),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Tenant(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Tenant(err) => Some(err),
            Self::NotFound { .. }
            | Self::Conflict(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TenantError> for RepoError {
    fn from(value: TenantError) -> Self {
        Self::Tenant(value)
    }
}

/// Fails unless the connection is migrated to this binary's schema.
pub(crate) fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = schema_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Checks that an active row of `table` belongs to `merchant_id`.
///
/// Foreign keys alone cannot stop a row from pointing at another merchant's
/// record; writes referencing students/papers call this first.
pub(crate) fn ensure_owned(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
    merchant_id: MerchantId,
) -> RepoResult<()> {
    let active_filter = match table {
        "students" | "teachers" => " AND is_deleted = 0",
        _ => "",
    };
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(
                SELECT 1 FROM {table} WHERE uuid = ?1 AND merchant_id = ?2{active_filter}
            );"
        ),
        [id.to_string(), merchant_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::NotFound { entity, id })
    }
}

/// Maps constraint violations of a write to `Conflict`.
pub(crate) fn map_write_error(err: rusqlite::Error, what: &str) -> RepoError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        return RepoError::Conflict(format!("{what}: {err}"));
    }
    RepoError::from(err)
}

/// Clamps a list limit to `1..=100`, defaulting to 20.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => DEFAULT_LIST_LIMIT,
        Some(value) => value.min(MAX_LIST_LIMIT),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_enum<T>(
    value: &str,
    column: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<T> {
    parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

pub(crate) fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub(crate) fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |value| Value::Text(value.to_string()))
}

pub(crate) fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}
