//! School domain records.
//!
//! # Responsibility
//! - Define the records persisted by tenant-scoped repositories.
//! - Own record-level validation and the review state machine.
//!
//! # Invariants
//! - Every tenant-owned record carries `merchant_id`; `None` only on records
//!   not yet persisted, meaning "fill from the caller's scope".
//! - Records are soft-deleted where history matters (students, teachers).

pub mod attendance;
pub mod certificate;
pub mod exam;
pub mod invoice;
pub mod merchant;
pub mod review;
pub mod student;
pub mod teacher;
pub mod validation;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
