use campus_core::model::certificate::CertificateKind;
use campus_core::model::invoice::{InvoiceItem, PaymentMethod};
use campus_core::model::merchant::Merchant;
use campus_core::model::student::{Student, StudentId};
use campus_core::repo::certificate_repo::{CertificateRepository, SqliteCertificateRepository};
use campus_core::repo::invoice_repo::SqliteInvoiceRepository;
use campus_core::repo::merchant_repo::{MerchantRepository, SqliteMerchantRepository};
use campus_core::repo::student_repo::{SqliteStudentRepository, StudentRepository};
use campus_core::service::certificate_service::CertificateService;
use campus_core::service::invoice_service::{InvoiceService, PaymentRequest};
use campus_core::{
    open_db_in_memory, MerchantId, Principal, RepoError, Role, ScopePolicy, ServiceError,
    TenantContext, TenantScope,
};
use rusqlite::Connection;

type Service<'conn> = CertificateService<
    SqliteCertificateRepository<'conn>,
    SqliteStudentRepository<'conn>,
    SqliteInvoiceRepository<'conn>,
>;

#[test]
fn serials_run_per_kind_and_record_the_issuer() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn);
    let student = admit(&conn, merchant, "A-1");
    let principal = Principal::member(merchant, Role::Principal);
    let office = certificate_service(&conn, principal);

    let first = office
        .issue(student, CertificateKind::Bonafide, Some("For passport"))
        .unwrap();
    let second = office.issue(student, CertificateKind::Bonafide, None).unwrap();
    let character = office.issue(student, CertificateKind::Character, None).unwrap();

    assert_eq!(first.serial_no.as_deref(), Some("BON-0001"));
    assert_eq!(second.serial_no.as_deref(), Some("BON-0002"));
    assert_eq!(character.serial_no.as_deref(), Some("CHR-0001"));
    assert_eq!(first.issued_by, principal.user_id);
    assert_eq!(first.remarks.as_deref(), Some("For passport"));
    assert_eq!(first.merchant_id, Some(merchant));
    assert!(first.issued_at.is_some());

    let listed = office.list_for_student(student).unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(office.get(character.uuid).unwrap(), character);
}

#[test]
fn transfer_certificate_requires_cleared_fees() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn);
    let student = admit(&conn, merchant, "A-1");
    let office = certificate_service(&conn, Principal::member(merchant, Role::Principal));

    let accountant = Principal::member(merchant, Role::Accountant);
    let desk_context = context(&accountant);
    let desk = InvoiceService::new(
        SqliteInvoiceRepository::try_new(&conn, desk_context).unwrap(),
        SqliteStudentRepository::try_new(&conn, desk_context).unwrap(),
        accountant,
    );
    let invoice = desk
        .issue_invoice(student, vec![InvoiceItem::new("Tuition", 90_000)], "2026-06-30")
        .unwrap();

    let blocked = office
        .issue(student, CertificateKind::Transfer, None)
        .unwrap_err();
    assert!(matches!(blocked, ServiceError::RuleViolation(_)));
    assert!(office.list_for_student(student).unwrap().is_empty());

    office
        .issue(student, CertificateKind::Completion, None)
        .unwrap();

    desk.record_payment(&PaymentRequest {
        invoice_id: invoice.uuid,
        amount_minor: 90_000,
        method: PaymentMethod::Cash,
        reference: None,
    })
    .unwrap();
    let transfer = office
        .issue(student, CertificateKind::Transfer, Some("Relocating"))
        .unwrap();
    assert_eq!(transfer.serial_no.as_deref(), Some("TC-0001"));
}

#[test]
fn revocation_happens_once() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn);
    let student = admit(&conn, merchant, "A-1");
    let office = certificate_service(&conn, Principal::member(merchant, Role::Admin));

    let issued = office.issue(student, CertificateKind::Bonafide, None).unwrap();
    let revoked = office.revoke(issued.uuid).unwrap();
    assert!(revoked.is_revoked());
    assert!(office.get(issued.uuid).unwrap().revoked_at.is_some());

    assert!(matches!(
        office.revoke(issued.uuid),
        Err(ServiceError::RuleViolation(_))
    ));
    let repo = SqliteCertificateRepository::try_new(
        &conn,
        TenantContext::new(TenantScope::Merchant(merchant), ScopePolicy { debug: true }),
    )
    .unwrap();
    assert!(matches!(
        repo.revoke_certificate(issued.uuid),
        Err(RepoError::Conflict(_))
    ));
}

#[test]
fn withdrawn_students_and_unauthorized_roles_cannot_get_certificates() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn);
    let student = admit(&conn, merchant, "A-1");

    let teacher_office = certificate_service(&conn, Principal::member(merchant, Role::Teacher));
    assert!(matches!(
        teacher_office.issue(student, CertificateKind::Character, None),
        Err(ServiceError::Forbidden(_))
    ));

    SqliteStudentRepository::try_new(
        &conn,
        TenantContext::new(TenantScope::Merchant(merchant), ScopePolicy { debug: true }),
    )
    .unwrap()
    .soft_delete_student(student)
    .unwrap();

    let office = certificate_service(&conn, Principal::member(merchant, Role::Principal));
    assert!(matches!(
        office.issue(student, CertificateKind::Character, None),
        Err(ServiceError::NotFound { entity: "student", .. })
    ));
}

fn seed_merchant(conn: &Connection) -> MerchantId {
    let repo = SqliteMerchantRepository::try_new(
        conn,
        TenantContext::new(TenantScope::Global, ScopePolicy { debug: true }),
    )
    .unwrap();
    repo.create_merchant(&Merchant::new("DPS", "Test School"))
        .unwrap()
        .uuid
}

fn context(principal: &Principal) -> TenantContext {
    TenantContext::for_principal(principal, ScopePolicy { debug: true }).unwrap()
}

fn admit(conn: &Connection, merchant_id: MerchantId, no: &str) -> StudentId {
    SqliteStudentRepository::try_new(
        conn,
        TenantContext::new(TenantScope::Merchant(merchant_id), ScopePolicy { debug: true }),
    )
    .unwrap()
    .create_student(&Student::new(no, "Asha Rao", "10"))
    .unwrap()
    .uuid
}

fn certificate_service(conn: &Connection, principal: Principal) -> Service<'_> {
    let scope = context(&principal);
    CertificateService::new(
        SqliteCertificateRepository::try_new(conn, scope).unwrap(),
        SqliteStudentRepository::try_new(conn, scope).unwrap(),
        SqliteInvoiceRepository::try_new(conn, scope).unwrap(),
        principal,
    )
}
