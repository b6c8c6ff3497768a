//! Invoice and payment repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Invoice numbers are sequential per merchant and never reused.
//! - A payment and the invoice balance it changes commit together.
//! - Amount updates are guarded in SQL so concurrent payments cannot push
//!   `paid_minor` above `total_minor`.

use crate::model::invoice::{
    format_invoice_number, Invoice, InvoiceId, InvoiceItem, InvoiceStatus, Payment, PaymentMethod,
};
use crate::model::student::StudentId;
use crate::repo::{
    ensure_owned, ensure_schema_ready, map_write_error, parse_enum, parse_uuid, text, RepoError,
    RepoResult, ScopedQuery,
};
use crate::tenant::TenantContext;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const INVOICE_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    student_id,
    number,
    total_minor,
    paid_minor,
    status,
    due_on,
    issued_at
FROM invoices";

const PAYMENT_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    invoice_id,
    amount_minor,
    method,
    reference,
    paid_at
FROM payments";

pub trait InvoiceRepository {
    /// Inserts the invoice with its items and assigns the next number.
    fn create_invoice(&self, invoice: &Invoice) -> RepoResult<Invoice>;
    fn get_invoice(&self, id: InvoiceId) -> RepoResult<Option<Invoice>>;
    fn list_invoices(
        &self,
        student_id: Option<StudentId>,
        status: Option<InvoiceStatus>,
    ) -> RepoResult<Vec<Invoice>>;
    /// Stores the payment and applies it to the invoice balance.
    ///
    /// Fails with `Conflict` on a cancelled invoice or an overpayment.
    fn record_payment(&self, payment: &Payment) -> RepoResult<(Payment, Invoice)>;
    /// Cancels an invoice that has not received any payment.
    fn cancel_invoice(&self, id: InvoiceId) -> RepoResult<Invoice>;
    fn list_payments(&self, invoice_id: InvoiceId) -> RepoResult<Vec<Payment>>;
    /// Sum of open balances of one student.
    fn outstanding_for_student(&self, student_id: StudentId) -> RepoResult<i64>;
}

pub struct SqliteInvoiceRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteInvoiceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }

    fn load_invoice(&self, conn: &Connection, id: InvoiceId) -> RepoResult<Option<Invoice>> {
        let Some(mut invoice) =
            ScopedQuery::select(INVOICE_SELECT_SQL, "merchant_id", &self.tenant.scope)
                .eq("uuid", text(id.to_string()))
                .fetch_optional(conn, parse_invoice_row)?
        else {
            return Ok(None);
        };
        invoice.items = load_items(conn, id)?;
        invoice.validate()?;
        Ok(Some(invoice))
    }

    fn require_invoice(&self, conn: &Connection, id: InvoiceId) -> RepoResult<Invoice> {
        self.load_invoice(conn, id)?.ok_or(RepoError::NotFound {
            entity: "invoice",
            id,
        })
    }
}

impl InvoiceRepository for SqliteInvoiceRepository<'_> {
    fn create_invoice(&self, invoice: &Invoice) -> RepoResult<Invoice> {
        invoice.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(invoice.merchant_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_owned(&tx, "students", "student", invoice.student_id, merchant_id)?;

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM invoices WHERE merchant_id = ?1;",
            [merchant_id.to_string()],
            |row| row.get(0),
        )?;
        let number = format_invoice_number(seq);

        tx.execute(
            "INSERT INTO invoices (
                uuid,
                merchant_id,
                student_id,
                seq,
                number,
                total_minor,
                paid_minor,
                status,
                due_on
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8);",
            params![
                invoice.uuid.to_string(),
                merchant_id.to_string(),
                invoice.student_id.to_string(),
                seq,
                number.as_str(),
                invoice.total_minor,
                InvoiceStatus::Unpaid.as_str(),
                invoice.due_on.as_str(),
            ],
        )
        .map_err(|err| map_write_error(err, "invoice insert"))?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO invoice_items (invoice_id, position, label, amount_minor)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (position, item) in invoice.items.iter().enumerate() {
                stmt.execute(params![
                    invoice.uuid.to_string(),
                    position as i64,
                    item.label.as_str(),
                    item.amount_minor,
                ])?;
            }
        }

        let stored = self.require_invoice(&tx, invoice.uuid)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_invoice(&self, id: InvoiceId) -> RepoResult<Option<Invoice>> {
        self.load_invoice(self.conn, id)
    }

    fn list_invoices(
        &self,
        student_id: Option<StudentId>,
        status: Option<InvoiceStatus>,
    ) -> RepoResult<Vec<Invoice>> {
        let mut invoices =
            ScopedQuery::select(INVOICE_SELECT_SQL, "merchant_id", &self.tenant.scope)
                .eq_opt("student_id", student_id.map(|id| text(id.to_string())))
                .eq_opt("status", status.map(|status| text(status.as_str())))
                .order_by("seq ASC")
                .fetch_all(self.conn, parse_invoice_row)?;
        for invoice in &mut invoices {
            invoice.items = load_items(self.conn, invoice.uuid)?;
            invoice.validate()?;
        }
        Ok(invoices)
    }

    fn record_payment(&self, payment: &Payment) -> RepoResult<(Payment, Invoice)> {
        payment.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(payment.merchant_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_owned(&tx, "invoices", "invoice", payment.invoice_id, merchant_id)?;

        let applied = ScopedQuery::mutate(
            "UPDATE invoices
             SET
                paid_minor = paid_minor + ?,
                status = CASE
                    WHEN paid_minor + ? >= total_minor THEN 'paid'
                    ELSE 'partially_paid'
                END,
                updated_at = (strftime('%s', 'now') * 1000)",
            vec![
                Value::Integer(payment.amount_minor),
                Value::Integer(payment.amount_minor),
            ],
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(payment.invoice_id.to_string()))
        .and("status <> 'cancelled'", [])
        .and(
            "paid_minor + ? <= total_minor",
            [Value::Integer(payment.amount_minor)],
        )
        .execute(&tx)?;

        if applied == 0 {
            let invoice = self.require_invoice(&tx, payment.invoice_id)?;
            let reason = if invoice.status == InvoiceStatus::Cancelled {
                format!("invoice {} is cancelled", invoice.uuid)
            } else {
                format!(
                    "payment of {} exceeds balance {} of invoice {}",
                    payment.amount_minor,
                    invoice.balance_minor(),
                    invoice.uuid
                )
            };
            return Err(RepoError::Conflict(reason));
        }

        tx.execute(
            "INSERT INTO payments (uuid, merchant_id, invoice_id, amount_minor, method, reference)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                payment.uuid.to_string(),
                merchant_id.to_string(),
                payment.invoice_id.to_string(),
                payment.amount_minor,
                payment.method.as_str(),
                payment.reference.as_deref(),
            ],
        )
        .map_err(|err| map_write_error(err, "payment insert"))?;

        let paid_at: i64 = tx.query_row(
            "SELECT paid_at FROM payments WHERE uuid = ?1;",
            [payment.uuid.to_string()],
            |row| row.get(0),
        )?;
        let invoice = self.require_invoice(&tx, payment.invoice_id)?;
        tx.commit()?;

        Ok((
            Payment {
                merchant_id: Some(merchant_id),
                paid_at: Some(paid_at),
                ..payment.clone()
            },
            invoice,
        ))
    }

    fn cancel_invoice(&self, id: InvoiceId) -> RepoResult<Invoice> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = ScopedQuery::mutate(
            "UPDATE invoices
             SET
                status = 'cancelled',
                updated_at = (strftime('%s', 'now') * 1000)",
            Vec::new(),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .and("paid_minor = 0 AND status <> 'cancelled'", [])
        .execute(&tx)?;

        let invoice = self.require_invoice(&tx, id)?;
        if changed == 0 {
            let reason = if invoice.status == InvoiceStatus::Cancelled {
                format!("invoice {id} is already cancelled")
            } else {
                format!("invoice {id} has received payments")
            };
            return Err(RepoError::Conflict(reason));
        }
        tx.commit()?;
        Ok(invoice)
    }

    fn list_payments(&self, invoice_id: InvoiceId) -> RepoResult<Vec<Payment>> {
        ScopedQuery::select(PAYMENT_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("invoice_id", text(invoice_id.to_string()))
            .order_by("paid_at ASC, uuid ASC")
            .fetch_all(self.conn, parse_payment_row)
    }

    fn outstanding_for_student(&self, student_id: StudentId) -> RepoResult<i64> {
        let total = ScopedQuery::select(
            "SELECT COALESCE(SUM(total_minor - paid_minor), 0) AS outstanding FROM invoices",
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("student_id", text(student_id.to_string()))
        .and("status IN ('unpaid', 'partially_paid')", [])
        .fetch_optional(self.conn, |row| Ok(row.get::<_, i64>("outstanding")?))?;
        Ok(total.unwrap_or(0))
    }
}

fn load_items(conn: &Connection, invoice_id: InvoiceId) -> RepoResult<Vec<InvoiceItem>> {
    let mut stmt = conn.prepare(
        "SELECT label, amount_minor
         FROM invoice_items
         WHERE invoice_id = ?1
         ORDER BY position ASC;",
    )?;
    let rows = stmt.query_map([invoice_id.to_string()], |row| {
        Ok(InvoiceItem {
            label: row.get(0)?,
            amount_minor: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Reads the invoice header; items are loaded separately.
fn parse_invoice_row(row: &Row<'_>) -> RepoResult<Invoice> {
    let uuid_text: String = row.get("uuid")?;
    let merchant_text: String = row.get("merchant_id")?;
    let student_text: String = row.get("student_id")?;
    let status_text: String = row.get("status")?;

    Ok(Invoice {
        uuid: parse_uuid(&uuid_text, "invoices.uuid")?,
        merchant_id: Some(parse_uuid(&merchant_text, "invoices.merchant_id")?),
        student_id: parse_uuid(&student_text, "invoices.student_id")?,
        number: Some(row.get("number")?),
        items: Vec::new(),
        total_minor: row.get("total_minor")?,
        paid_minor: row.get("paid_minor")?,
        status: parse_enum(&status_text, "invoices.status", InvoiceStatus::parse)?,
        due_on: row.get("due_on")?,
        issued_at: Some(row.get("issued_at")?),
    })
}

fn parse_payment_row(row: &Row<'_>) -> RepoResult<Payment> {
    let uuid_text: String = row.get("uuid")?;
    let merchant_text: String = row.get("merchant_id")?;
    let invoice_text: String = row.get("invoice_id")?;
    let method_text: String = row.get("method")?;

    Ok(Payment {
        uuid: parse_uuid(&uuid_text, "payments.uuid")?,
        merchant_id: Some(parse_uuid(&merchant_text, "payments.merchant_id")?),
        invoice_id: parse_uuid(&invoice_text, "payments.invoice_id")?,
        amount_minor: row.get("amount_minor")?,
        method: parse_enum(&method_text, "payments.method", PaymentMethod::parse)?,
        reference: row.get("reference")?,
        paid_at: Some(row.get("paid_at")?),
    })
}
