use campus_core::model::invoice::{InvoiceItem, InvoiceStatus, Payment, PaymentMethod};
use campus_core::model::merchant::Merchant;
use campus_core::model::student::{Student, StudentId};
use campus_core::repo::invoice_repo::{InvoiceRepository, SqliteInvoiceRepository};
use campus_core::repo::merchant_repo::{MerchantRepository, SqliteMerchantRepository};
use campus_core::repo::student_repo::{SqliteStudentRepository, StudentRepository};
use campus_core::service::invoice_service::{InvoiceService, PaymentRequest};
use campus_core::{
    open_db_in_memory, MerchantId, Principal, RepoError, Role, ScopePolicy, ServiceError,
    TenantContext, TenantScope,
};
use rusqlite::Connection;

type Service<'conn> =
    InvoiceService<SqliteInvoiceRepository<'conn>, SqliteStudentRepository<'conn>>;

#[test]
fn invoice_numbers_are_sequential_per_merchant() {
    let conn = open_db_in_memory().unwrap();
    let north = seed_merchant(&conn, "NORTH");
    let south = seed_merchant(&conn, "SOUTH");
    let north_student = admit(&conn, north, "A-1");
    let south_student = admit(&conn, south, "A-1");
    let north_desk = invoice_service(&conn, north, Role::Accountant);
    let south_desk = invoice_service(&conn, south, Role::Accountant);

    let first = north_desk
        .issue_invoice(north_student, term_fees(), "2026-04-30")
        .unwrap();
    let second = north_desk
        .issue_invoice(north_student, vec![InvoiceItem::new("Bus", 120_000)], "2026-05-31")
        .unwrap();
    let other = south_desk
        .issue_invoice(south_student, term_fees(), "2026-04-30")
        .unwrap();

    assert_eq!(first.number.as_deref(), Some("INV-000001"));
    assert_eq!(second.number.as_deref(), Some("INV-000002"));
    assert_eq!(other.number.as_deref(), Some("INV-000001"));

    assert_eq!(first.total_minor, 550_000);
    assert_eq!(first.status, InvoiceStatus::Unpaid);
    assert_eq!(first.items, term_fees());
    assert!(first.issued_at.is_some());

    let listed = north_desk.list_invoices(Some(north_student), None).unwrap();
    let numbers: Vec<_> = listed.iter().filter_map(|i| i.number.as_deref()).collect();
    assert_eq!(numbers, ["INV-000001", "INV-000002"]);
}

#[test]
fn partial_then_full_payment_settles_invoice() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let student = admit(&conn, merchant, "A-1");
    let desk = invoice_service(&conn, merchant, Role::Accountant);
    let invoice = desk
        .issue_invoice(student, term_fees(), "2026-04-30")
        .unwrap();

    let (payment, partial) = desk
        .record_payment(&PaymentRequest {
            invoice_id: invoice.uuid,
            amount_minor: 200_000,
            method: PaymentMethod::Cash,
            reference: None,
        })
        .unwrap();
    assert!(payment.paid_at.is_some());
    assert_eq!(partial.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(partial.balance_minor(), 350_000);
    assert_eq!(desk.outstanding_for_student(student).unwrap(), 350_000);

    let (_, settled) = desk
        .record_payment(&PaymentRequest {
            invoice_id: invoice.uuid,
            amount_minor: 350_000,
            method: PaymentMethod::BankTransfer,
            reference: Some("UTR-99812".to_string()),
        })
        .unwrap();
    assert_eq!(settled.status, InvoiceStatus::Paid);
    assert_eq!(settled.paid_minor, settled.total_minor);
    assert_eq!(desk.outstanding_for_student(student).unwrap(), 0);

    let payments = desk.list_payments(invoice.uuid).unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(
        payments.iter().map(|p| p.amount_minor).sum::<i64>(),
        550_000
    );
    assert_eq!(
        desk.list_invoices(None, Some(InvoiceStatus::Paid))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn overpayment_and_invalid_amounts_are_refused() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let student = admit(&conn, merchant, "A-1");
    let desk = invoice_service(&conn, merchant, Role::Accountant);
    let invoice = desk
        .issue_invoice(student, term_fees(), "2026-04-30")
        .unwrap();

    let over = desk
        .record_payment(&PaymentRequest {
            invoice_id: invoice.uuid,
            amount_minor: 550_001,
            method: PaymentMethod::Card,
            reference: None,
        })
        .unwrap_err();
    assert!(matches!(over, ServiceError::RuleViolation(_)));

    for amount in [0, -100] {
        let err = desk
            .record_payment(&PaymentRequest {
                invoice_id: invoice.uuid,
                amount_minor: amount,
                method: PaymentMethod::Cash,
                reference: None,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "{amount}");
    }

    assert!(desk.list_payments(invoice.uuid).unwrap().is_empty());
    assert_eq!(desk.get_invoice(invoice.uuid).unwrap().paid_minor, 0);
}

#[test]
fn repository_guards_balance_without_the_service() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let student = admit(&conn, merchant, "A-1");
    let repo = SqliteInvoiceRepository::try_new(&conn, scoped(merchant)).unwrap();
    let invoice = invoice_service(&conn, merchant, Role::Admin)
        .issue_invoice(student, term_fees(), "2026-04-30")
        .unwrap();

    repo.record_payment(&Payment::new(invoice.uuid, 500_000, PaymentMethod::Cheque))
        .unwrap();
    let err = repo
        .record_payment(&Payment::new(invoice.uuid, 60_000, PaymentMethod::Cash))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    let stored = repo.get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(stored.paid_minor, 500_000);
    assert_eq!(repo.list_payments(invoice.uuid).unwrap().len(), 1);
}

#[test]
fn tampered_items_fail_single_and_list_reads() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let student = admit(&conn, merchant, "A-1");
    let invoice = invoice_service(&conn, merchant, Role::Accountant)
        .issue_invoice(student, term_fees(), "2026-04-30")
        .unwrap();

    conn.execute(
        "UPDATE invoice_items SET amount_minor = 1 WHERE invoice_id = ?1;",
        [invoice.uuid.to_string()],
    )
    .unwrap();

    let repo = SqliteInvoiceRepository::try_new(&conn, scoped(merchant)).unwrap();
    assert!(matches!(
        repo.get_invoice(invoice.uuid),
        Err(RepoError::Validation(_))
    ));
    assert!(matches!(
        repo.list_invoices(Some(student), None),
        Err(RepoError::Validation(_))
    ));
}

#[test]
fn cancellation_rules() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let student = admit(&conn, merchant, "A-1");
    let desk = invoice_service(&conn, merchant, Role::Accountant);

    let unpaid = desk
        .issue_invoice(student, term_fees(), "2026-04-30")
        .unwrap();
    let cancelled = desk.cancel_invoice(unpaid.uuid).unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    assert_eq!(desk.outstanding_for_student(student).unwrap(), 0);
    assert!(matches!(
        desk.cancel_invoice(unpaid.uuid),
        Err(ServiceError::RuleViolation(_))
    ));
    assert!(matches!(
        desk.record_payment(&PaymentRequest {
            invoice_id: unpaid.uuid,
            amount_minor: 100,
            method: PaymentMethod::Cash,
            reference: None,
        }),
        Err(ServiceError::RuleViolation(_))
    ));

    let partly_paid = desk
        .issue_invoice(student, term_fees(), "2026-05-31")
        .unwrap();
    desk.record_payment(&PaymentRequest {
        invoice_id: partly_paid.uuid,
        amount_minor: 100,
        method: PaymentMethod::Cash,
        reference: None,
    })
    .unwrap();
    assert!(matches!(
        desk.cancel_invoice(partly_paid.uuid),
        Err(ServiceError::RuleViolation(_))
    ));

    let repo = SqliteInvoiceRepository::try_new(&conn, scoped(merchant)).unwrap();
    assert!(matches!(
        repo.cancel_invoice(partly_paid.uuid),
        Err(RepoError::Conflict(_))
    ));
}

#[test]
fn issuing_requires_items_permission_and_active_student() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let student = admit(&conn, merchant, "A-1");

    let teacher_desk = invoice_service(&conn, merchant, Role::Teacher);
    assert!(matches!(
        teacher_desk.issue_invoice(student, term_fees(), "2026-04-30"),
        Err(ServiceError::Forbidden(_))
    ));

    let desk = invoice_service(&conn, merchant, Role::Accountant);
    assert!(matches!(
        desk.issue_invoice(student, Vec::new(), "2026-04-30"),
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        desk.issue_invoice(student, vec![InvoiceItem::new("Refund", -10)], "2026-04-30"),
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        desk.issue_invoice(
            student,
            vec![InvoiceItem::new("A", i64::MAX), InvoiceItem::new("B", 1)],
            "2026-04-30"
        ),
        Err(ServiceError::RuleViolation(_))
    ));

    SqliteStudentRepository::try_new(&conn, scoped(merchant))
        .unwrap()
        .soft_delete_student(student)
        .unwrap();
    assert!(matches!(
        desk.issue_invoice(student, term_fees(), "2026-04-30"),
        Err(ServiceError::NotFound { entity: "student", .. })
    ));
}

fn term_fees() -> Vec<InvoiceItem> {
    vec![
        InvoiceItem::new("Tuition", 450_000),
        InvoiceItem::new("Library", 100_000),
    ]
}

fn seed_merchant(conn: &Connection, code: &str) -> MerchantId {
    let repo = SqliteMerchantRepository::try_new(
        conn,
        TenantContext::new(TenantScope::Global, ScopePolicy { debug: true }),
    )
    .unwrap();
    repo.create_merchant(&Merchant::new(code, "Test School"))
        .unwrap()
        .uuid
}

fn scoped(merchant_id: MerchantId) -> TenantContext {
    TenantContext::new(TenantScope::Merchant(merchant_id), ScopePolicy { debug: true })
}

fn admit(conn: &Connection, merchant_id: MerchantId, no: &str) -> StudentId {
    SqliteStudentRepository::try_new(conn, scoped(merchant_id))
        .unwrap()
        .create_student(&Student::new(no, "Asha Rao", "5"))
        .unwrap()
        .uuid
}

fn invoice_service(conn: &Connection, merchant_id: MerchantId, role: Role) -> Service<'_> {
    let principal = Principal::member(merchant_id, role);
    let context = TenantContext::for_principal(&principal, ScopePolicy { debug: true }).unwrap();
    InvoiceService::new(
        SqliteInvoiceRepository::try_new(conn, context).unwrap(),
        SqliteStudentRepository::try_new(conn, context).unwrap(),
        principal,
    )
}
