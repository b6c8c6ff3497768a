//! Certificate issuing use-cases.
//!
//! # Invariants
//! - Certificates are issued only to active students.
//! - A transfer certificate requires a cleared fee account.
//! - Revocation happens once.

use crate::model::certificate::{Certificate, CertificateId, CertificateKind};
use crate::model::student::StudentId;
use crate::repo::certificate_repo::CertificateRepository;
use crate::repo::invoice_repo::InvoiceRepository;
use crate::repo::student_repo::StudentRepository;
use crate::service::{authorize, found, ServiceError, ServiceResult};
use crate::tenant::{Permission, Principal};
use log::info;

pub struct CertificateService<C, S, I>
where
    C: CertificateRepository,
    S: StudentRepository,
    I: InvoiceRepository,
{
    certificates: C,
    students: S,
    invoices: I,
    principal: Principal,
}

impl<C, S, I> CertificateService<C, S, I>
where
    C: CertificateRepository,
    S: StudentRepository,
    I: InvoiceRepository,
{
    pub fn new(certificates: C, students: S, invoices: I, principal: Principal) -> Self {
        Self {
            certificates,
            students,
            invoices,
            principal,
        }
    }

    /// Issues a certificate signed by the acting principal.
    pub fn issue(
        &self,
        student_id: StudentId,
        kind: CertificateKind,
        remarks: Option<&str>,
    ) -> ServiceResult<Certificate> {
        authorize(&self.principal, Permission::IssueCertificates)?;
        let student = found(
            self.students.get_student(student_id, false)?,
            "student",
            student_id,
        )?;

        if kind == CertificateKind::Transfer {
            let outstanding = self.invoices.outstanding_for_student(student_id)?;
            if outstanding > 0 {
                return Err(ServiceError::RuleViolation(format!(
                    "student {student_id} has {outstanding} outstanding in fees"
                )));
            }
        }

        let mut certificate = Certificate::new(student_id, kind, self.principal.user_id);
        certificate.merchant_id = student.merchant_id;
        certificate.remarks = remarks.map(str::to_string);
        let stored = self.certificates.create_certificate(&certificate)?;
        info!(
            "event=certificate_issue module=service status=ok certificate_id={} kind={} serial_no={}",
            stored.uuid,
            stored.kind.as_str(),
            stored.serial_no.as_deref().unwrap_or_default()
        );
        Ok(stored)
    }

    pub fn revoke(&self, id: CertificateId) -> ServiceResult<Certificate> {
        authorize(&self.principal, Permission::IssueCertificates)?;
        let current = self.get(id)?;
        if current.is_revoked() {
            return Err(ServiceError::RuleViolation(format!(
                "certificate {id} is already revoked"
            )));
        }

        let revoked = self.certificates.revoke_certificate(id)?;
        info!("event=certificate_revoke module=service status=ok certificate_id={id}");
        Ok(revoked)
    }

    pub fn get(&self, id: CertificateId) -> ServiceResult<Certificate> {
        found(self.certificates.get_certificate(id)?, "certificate", id)
    }

    pub fn list_for_student(&self, student_id: StudentId) -> ServiceResult<Vec<Certificate>> {
        Ok(self.certificates.list_for_student(student_id)?)
    }
}
