//! Fee invoicing and payment use-cases.
//!
//! # Invariants
//! - Invoices are issued only to active students.
//! - A payment is positive, never above the open balance and never applied
//!   to a cancelled invoice.
//! - Only invoices without payments can be cancelled.

use crate::model::invoice::{
    Invoice, InvoiceId, InvoiceItem, InvoiceStatus, Payment, PaymentMethod,
};
use crate::model::student::StudentId;
use crate::repo::invoice_repo::InvoiceRepository;
use crate::repo::student_repo::StudentRepository;
use crate::service::{authorize, found, ServiceError, ServiceResult};
use crate::tenant::{Permission, Principal};
use log::info;

/// Request model for recording a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub invoice_id: InvoiceId,
    /// Minor currency units.
    pub amount_minor: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

pub struct InvoiceService<R: InvoiceRepository, S: StudentRepository> {
    invoices: R,
    students: S,
    principal: Principal,
}

impl<R: InvoiceRepository, S: StudentRepository> InvoiceService<R, S> {
    pub fn new(invoices: R, students: S, principal: Principal) -> Self {
        Self {
            invoices,
            students,
            principal,
        }
    }

    /// Issues an unpaid invoice summing `items`.
    pub fn issue_invoice(
        &self,
        student_id: StudentId,
        items: Vec<InvoiceItem>,
        due_on: &str,
    ) -> ServiceResult<Invoice> {
        authorize(&self.principal, Permission::ManageInvoices)?;
        let student = found(
            self.students.get_student(student_id, false)?,
            "student",
            student_id,
        )?;

        let mut invoice = Invoice::new(student_id, items, due_on).ok_or_else(|| {
            ServiceError::RuleViolation("invoice total exceeds the supported range".to_string())
        })?;
        invoice.merchant_id = student.merchant_id;
        invoice.validate()?;

        let stored = self.invoices.create_invoice(&invoice)?;
        info!(
            "event=invoice_issue module=service status=ok invoice_id={} items={} total_minor={}",
            stored.uuid,
            stored.items.len(),
            stored.total_minor
        );
        Ok(stored)
    }

    /// Applies a payment and returns it with the updated invoice.
    pub fn record_payment(&self, request: &PaymentRequest) -> ServiceResult<(Payment, Invoice)> {
        authorize(&self.principal, Permission::RecordPayments)?;

        let mut payment = Payment::new(request.invoice_id, request.amount_minor, request.method);
        payment.reference = request.reference.clone();
        payment.validate()?;

        let invoice = self.get_invoice(request.invoice_id)?;
        payment.merchant_id = invoice.merchant_id;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(ServiceError::RuleViolation(format!(
                "invoice {} is cancelled",
                invoice.uuid
            )));
        }
        if request.amount_minor > invoice.balance_minor() {
            return Err(ServiceError::RuleViolation(format!(
                "payment of {} exceeds balance {}",
                request.amount_minor,
                invoice.balance_minor()
            )));
        }

        let (payment, invoice) = self.invoices.record_payment(&payment)?;
        info!(
            "event=payment_record module=service status=ok invoice_id={} payment_id={} amount_minor={} invoice_status={}",
            invoice.uuid,
            payment.uuid,
            payment.amount_minor,
            invoice.status.as_str()
        );
        Ok((payment, invoice))
    }

    pub fn cancel_invoice(&self, id: InvoiceId) -> ServiceResult<Invoice> {
        authorize(&self.principal, Permission::ManageInvoices)?;
        let invoice = self.get_invoice(id)?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(ServiceError::RuleViolation(format!(
                "invoice {id} is already cancelled"
            )));
        }
        if invoice.paid_minor > 0 {
            return Err(ServiceError::RuleViolation(format!(
                "invoice {id} has received payments"
            )));
        }

        let cancelled = self.invoices.cancel_invoice(id)?;
        info!("event=invoice_cancel module=service status=ok invoice_id={id}");
        Ok(cancelled)
    }

    pub fn get_invoice(&self, id: InvoiceId) -> ServiceResult<Invoice> {
        found(self.invoices.get_invoice(id)?, "invoice", id)
    }

    pub fn list_invoices(
        &self,
        student_id: Option<StudentId>,
        status: Option<InvoiceStatus>,
    ) -> ServiceResult<Vec<Invoice>> {
        Ok(self.invoices.list_invoices(student_id, status)?)
    }

    pub fn list_payments(&self, invoice_id: InvoiceId) -> ServiceResult<Vec<Payment>> {
        Ok(self.invoices.list_payments(invoice_id)?)
    }

    /// Open balance over all unpaid and partially paid invoices.
    pub fn outstanding_for_student(&self, student_id: StudentId) -> ServiceResult<i64> {
        Ok(self.invoices.outstanding_for_student(student_id)?)
    }
}
