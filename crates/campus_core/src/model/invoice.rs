//! Fee invoices and payments.
//!
//! Amounts are integer minor currency units (paise, cents).
//!
//! # Invariants
//! - `0 <= paid_minor <= total_minor`.
//! - `total_minor` is the sum of item amounts.
//! - Status is derived from the amounts, except `Cancelled` which is sticky.

use crate::model::student::StudentId;
use crate::model::validation::{
    optional_text, require_text, validate_iso_date, ValidationError, ValidationResult,
};
use crate::tenant::MerchantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type InvoiceId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(Self::Unpaid),
            "partially_paid" => Some(Self::PartiallyPaid),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Derives the payment status of a live invoice.
    pub fn derive(total_minor: i64, paid_minor: i64) -> Self {
        if paid_minor <= 0 {
            Self::Unpaid
        } else if paid_minor >= total_minor {
            Self::Paid
        } else {
            Self::PartiallyPaid
        }
    }

    /// Whether the invoice still expects money.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Unpaid | Self::PartiallyPaid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub label: String,
    pub amount_minor: i64,
}

impl InvoiceItem {
    pub fn new(label: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            label: label.into(),
            amount_minor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub uuid: InvoiceId,
    pub merchant_id: Option<MerchantId>,
    pub student_id: StudentId,
    /// Assigned on insert, `INV-000001` style, sequential per merchant.
    pub number: Option<String>,
    pub items: Vec<InvoiceItem>,
    pub total_minor: i64,
    pub paid_minor: i64,
    pub status: InvoiceStatus,
    pub due_on: String,
    /// Epoch ms; assigned by storage.
    pub issued_at: Option<i64>,
}

impl Invoice {
    /// Builds an unpaid invoice; the total is summed from `items`.
    ///
    /// Returns `None` when the sum overflows.
    pub fn new(
        student_id: StudentId,
        items: Vec<InvoiceItem>,
        due_on: impl Into<String>,
    ) -> Option<Self> {
        let total_minor = items
            .iter()
            .try_fold(0_i64, |sum, item| sum.checked_add(item.amount_minor))?;
        Some(Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            student_id,
            number: None,
            items,
            total_minor,
            paid_minor: 0,
            status: InvoiceStatus::Unpaid,
            due_on: due_on.into(),
            issued_at: None,
        })
    }

    pub fn balance_minor(&self) -> i64 {
        self.total_minor - self.paid_minor
    }

    pub fn validate(&self) -> ValidationResult {
        if self.items.is_empty() {
            return Err(ValidationError::Empty("items"));
        }
        let mut sum = 0_i64;
        for item in &self.items {
            require_text("item.label", &item.label, 80)?;
            if item.amount_minor <= 0 {
                return Err(ValidationError::OutOfRange {
                    field: "item.amount_minor",
                    message: format!("must be positive, got {}", item.amount_minor),
                });
            }
            sum = sum
                .checked_add(item.amount_minor)
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "total_minor",
                    message: "overflows".to_string(),
                })?;
        }
        if sum != self.total_minor {
            return Err(ValidationError::OutOfRange {
                field: "total_minor",
                message: format!("does not match item sum {sum}"),
            });
        }
        if self.paid_minor < 0 || self.paid_minor > self.total_minor {
            return Err(ValidationError::OutOfRange {
                field: "paid_minor",
                message: format!("must be within 0..={}", self.total_minor),
            });
        }
        validate_iso_date("due_on", &self.due_on)
    }
}

/// Formats the per-merchant invoice number.
pub fn format_invoice_number(seq: i64) -> String {
    format!("INV-{seq:06}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::Cheque => "cheque",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(Self::Cash),
            "bank_transfer" => Some(Self::BankTransfer),
            "card" => Some(Self::Card),
            "cheque" => Some(Self::Cheque),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub uuid: Uuid,
    pub merchant_id: Option<MerchantId>,
    pub invoice_id: InvoiceId,
    pub amount_minor: i64,
    pub method: PaymentMethod,
    /// Bank/cheque reference, if any.
    pub reference: Option<String>,
    pub paid_at: Option<i64>,
}

impl Payment {
    pub fn new(invoice_id: InvoiceId, amount_minor: i64, method: PaymentMethod) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            invoice_id,
            amount_minor,
            method,
            reference: None,
            paid_at: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        if self.amount_minor <= 0 {
            return Err(ValidationError::OutOfRange {
                field: "amount_minor",
                message: format!("must be positive, got {}", self.amount_minor),
            });
        }
        optional_text("reference", self.reference.as_deref(), 64)
    }
}

#[cfg(test)]
mod tests {
    use super::{format_invoice_number, Invoice, InvoiceItem, InvoiceStatus};
    use uuid::Uuid;

    #[test]
    fn status_is_derived_from_amounts() {
        assert_eq!(InvoiceStatus::derive(1_000, 0), InvoiceStatus::Unpaid);
        assert_eq!(InvoiceStatus::derive(1_000, 400), InvoiceStatus::PartiallyPaid);
        assert_eq!(InvoiceStatus::derive(1_000, 1_000), InvoiceStatus::Paid);
    }

    #[test]
    fn total_is_summed_and_overflow_is_refused() {
        let invoice = Invoice::new(
            Uuid::new_v4(),
            vec![InvoiceItem::new("Tuition", 120_000), InvoiceItem::new("Lab", 15_000)],
            "2026-04-10",
        )
        .expect("sum fits");
        assert_eq!(invoice.total_minor, 135_000);
        assert!(invoice.validate().is_ok());

        let overflow = Invoice::new(
            Uuid::new_v4(),
            vec![InvoiceItem::new("a", i64::MAX), InvoiceItem::new("b", 1)],
            "2026-04-10",
        );
        assert!(overflow.is_none());
    }

    #[test]
    fn non_positive_items_are_invalid() {
        let invoice = Invoice::new(
            Uuid::new_v4(),
            vec![InvoiceItem::new("Refund", -10)],
            "2026-04-10",
        )
        .expect("sum fits");
        assert!(invoice.validate().is_err());
    }

    #[test]
    fn invoice_numbers_are_zero_padded() {
        assert_eq!(format_invoice_number(7), "INV-000007");
    }
}
