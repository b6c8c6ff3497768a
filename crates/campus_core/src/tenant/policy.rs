//! Role permission policy for write use-cases.
//!
//! Deny by default: a role holds only the permissions listed in
//! [`Role::allows`]. `SuperAdmin` holds all of them.

use super::principal::{Principal, Role};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Write permission checked by services before touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ManageMerchants,
    ManageStudents,
    ManageTeachers,
    RecordAttendance,
    ManageExams,
    AuthorExamPapers,
    EnterMarks,
    ManageInvoices,
    RecordPayments,
    IssueCertificates,
}

impl Permission {
    /// Stable string id used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManageMerchants => "manage_merchants",
            Self::ManageStudents => "manage_students",
            Self::ManageTeachers => "manage_teachers",
            Self::RecordAttendance => "record_attendance",
            Self::ManageExams => "manage_exams",
            Self::AuthorExamPapers => "author_exam_papers",
            Self::EnterMarks => "enter_marks",
            Self::ManageInvoices => "manage_invoices",
            Self::RecordPayments => "record_payments",
            Self::IssueCertificates => "issue_certificates",
        }
    }
}

impl Role {
    /// Returns whether this role holds `permission`.
    pub fn allows(self, permission: Permission) -> bool {
        use Permission::*;

        match self {
            Role::SuperAdmin => true,
            Role::Admin => !matches!(permission, ManageMerchants),
            Role::Principal => matches!(
                permission,
                ManageStudents | ManageTeachers | ManageExams | IssueCertificates
            ),
            Role::Teacher => matches!(permission, RecordAttendance | AuthorExamPapers | EnterMarks),
            Role::Accountant => matches!(permission, ManageInvoices | RecordPayments),
        }
    }
}

/// Permission denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyError {
    pub role: Role,
    pub permission: Permission,
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "role `{}` lacks permission `{}`",
            self.role.as_str(),
            self.permission.as_str()
        )
    }
}

impl Error for PolicyError {}

/// Fails unless `principal` holds `permission`.
pub fn require(principal: &Principal, permission: Permission) -> Result<(), PolicyError> {
    if principal.role.allows(permission) {
        Ok(())
    } else {
        Err(PolicyError {
            role: principal.role,
            permission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{require, Permission, PolicyError};
    use crate::tenant::principal::{Principal, Role};
    use uuid::Uuid;

    const ALL: [Permission; 10] = [
        Permission::ManageMerchants,
        Permission::ManageStudents,
        Permission::ManageTeachers,
        Permission::RecordAttendance,
        Permission::ManageExams,
        Permission::AuthorExamPapers,
        Permission::EnterMarks,
        Permission::ManageInvoices,
        Permission::RecordPayments,
        Permission::IssueCertificates,
    ];

    #[test]
    fn super_admin_holds_every_permission() {
        assert!(ALL.iter().all(|p| Role::SuperAdmin.allows(*p)));
    }

    #[test]
    fn only_super_admin_manages_merchants() {
        for role in [Role::Admin, Role::Principal, Role::Teacher, Role::Accountant] {
            assert!(!role.allows(Permission::ManageMerchants), "{role:?}");
        }
    }

    #[test]
    fn accountant_is_limited_to_fee_desk() {
        let allowed: Vec<Permission> = ALL
            .into_iter()
            .filter(|p| Role::Accountant.allows(*p))
            .collect();
        assert_eq!(
            allowed,
            vec![Permission::ManageInvoices, Permission::RecordPayments]
        );
    }

    #[test]
    fn require_reports_role_and_permission() {
        let teacher = Principal::member(Uuid::new_v4(), Role::Teacher);
        assert!(require(&teacher, Permission::EnterMarks).is_ok());
        let err = require(&teacher, Permission::ManageInvoices).expect_err("teacher cannot bill");
        assert_eq!(
            err,
            PolicyError {
                role: Role::Teacher,
                permission: Permission::ManageInvoices
            }
        );
        assert!(err.to_string().contains("manage_invoices"));
    }
}
