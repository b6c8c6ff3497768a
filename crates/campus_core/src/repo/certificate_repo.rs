//! Certificate register repository.

use crate::model::certificate::{format_serial, Certificate, CertificateId, CertificateKind};
use crate::model::student::StudentId;
use crate::repo::{
    ensure_owned, ensure_schema_ready, map_write_error, parse_enum, parse_uuid, text, RepoError,
    RepoResult, ScopedQuery,
};
use crate::tenant::TenantContext;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const CERTIFICATE_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    student_id,
    kind,
    serial_no,
    remarks,
    issued_by,
    issued_at,
    revoked_at
FROM certificates";

pub trait CertificateRepository {
    /// Stores the certificate under the next serial of its kind.
    fn create_certificate(&self, certificate: &Certificate) -> RepoResult<Certificate>;
    fn get_certificate(&self, id: CertificateId) -> RepoResult<Option<Certificate>>;
    fn list_for_student(&self, student_id: StudentId) -> RepoResult<Vec<Certificate>>;
    /// Marks a live certificate revoked; revoking twice is a conflict.
    fn revoke_certificate(&self, id: CertificateId) -> RepoResult<Certificate>;
}

pub struct SqliteCertificateRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteCertificateRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }

    fn load(&self, conn: &Connection, id: CertificateId) -> RepoResult<Option<Certificate>> {
        ScopedQuery::select(CERTIFICATE_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("uuid", text(id.to_string()))
            .fetch_optional(conn, parse_certificate_row)
    }
}

impl CertificateRepository for SqliteCertificateRepository<'_> {
    fn create_certificate(&self, certificate: &Certificate) -> RepoResult<Certificate> {
        certificate.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(certificate.merchant_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_owned(&tx, "students", "student", certificate.student_id, merchant_id)?;

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1
             FROM certificates
             WHERE merchant_id = ?1 AND kind = ?2;",
            params![merchant_id.to_string(), certificate.kind.as_str()],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO certificates (
                uuid,
                merchant_id,
                student_id,
                kind,
                seq,
                serial_no,
                remarks,
                issued_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                certificate.uuid.to_string(),
                merchant_id.to_string(),
                certificate.student_id.to_string(),
                certificate.kind.as_str(),
                seq,
                format_serial(certificate.kind, seq),
                certificate.remarks.as_deref(),
                certificate.issued_by.to_string(),
            ],
        )
        .map_err(|err| map_write_error(err, "certificate insert"))?;

        let stored = self
            .load(&tx, certificate.uuid)?
            .ok_or(RepoError::NotFound {
                entity: "certificate",
                id: certificate.uuid,
            })?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_certificate(&self, id: CertificateId) -> RepoResult<Option<Certificate>> {
        self.load(self.conn, id)
    }

    fn list_for_student(&self, student_id: StudentId) -> RepoResult<Vec<Certificate>> {
        ScopedQuery::select(CERTIFICATE_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("student_id", text(student_id.to_string()))
            .order_by("issued_at ASC, kind ASC, seq ASC")
            .fetch_all(self.conn, parse_certificate_row)
    }

    fn revoke_certificate(&self, id: CertificateId) -> RepoResult<Certificate> {
        let changed = ScopedQuery::mutate(
            "UPDATE certificates SET revoked_at = (strftime('%s', 'now') * 1000)",
            Vec::new(),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .and("revoked_at IS NULL", [])
        .execute(self.conn)?;

        let stored = self.load(self.conn, id)?.ok_or(RepoError::NotFound {
            entity: "certificate",
            id,
        })?;
        if changed == 0 {
            return Err(RepoError::Conflict(format!(
                "certificate {} is already revoked",
                stored.serial_no.as_deref().unwrap_or_default()
            )));
        }
        Ok(stored)
    }
}

fn parse_certificate_row(row: &Row<'_>) -> RepoResult<Certificate> {
    let uuid_text: String = row.get("uuid")?;
    let merchant_text: String = row.get("merchant_id")?;
    let student_text: String = row.get("student_id")?;
    let kind_text: String = row.get("kind")?;
    let issued_by_text: String = row.get("issued_by")?;

    Ok(Certificate {
        uuid: parse_uuid(&uuid_text, "certificates.uuid")?,
        merchant_id: Some(parse_uuid(&merchant_text, "certificates.merchant_id")?),
        student_id: parse_uuid(&student_text, "certificates.student_id")?,
        kind: parse_enum(&kind_text, "certificates.kind", CertificateKind::parse)?,
        serial_no: Some(row.get("serial_no")?),
        remarks: row.get("remarks")?,
        issued_by: parse_uuid(&issued_by_text, "certificates.issued_by")?,
        issued_at: Some(row.get("issued_at")?),
        revoked_at: row.get("revoked_at")?,
    })
}
