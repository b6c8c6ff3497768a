//! Field validation shared by all school records.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid iso date regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").expect("valid phone regex"));
static RECORD_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9/\-]{0,31}$").expect("valid code regex"));

/// Record-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text is blank.
    Empty(&'static str),
    /// Text exceeds the field limit (in chars).
    TooLong { field: &'static str, max: usize },
    /// Value does not match the field format.
    InvalidFormat { field: &'static str, value: String },
    /// Numeric or date relation does not hold.
    OutOfRange {
        field: &'static str,
        message: String,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(field) => write!(f, "`{field}` must not be empty"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::InvalidFormat { field, value } => {
                write!(f, "`{field}` has invalid format: `{value}`")
            }
            Self::OutOfRange { field, message } => write!(f, "`{field}` {message}"),
        }
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Requires non-blank text of at most `max` chars.
pub fn require_text(field: &'static str, value: &str, max: usize) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    optional_text(field, Some(value), max)
}

/// Checks the length of optional text; blank optional text is allowed.
pub fn optional_text(field: &'static str, value: Option<&str>, max: usize) -> ValidationResult {
    match value {
        Some(value) if value.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}

/// Validates admission/employee style record codes.
pub fn validate_record_code(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    matches_format(field, value, &RECORD_CODE_RE)
}

pub fn validate_email(field: &'static str, value: &str) -> ValidationResult {
    matches_format(field, value, &EMAIL_RE)
}

pub fn validate_phone(field: &'static str, value: &str) -> ValidationResult {
    matches_format(field, value, &PHONE_RE)
}

/// Validates a calendar date in `YYYY-MM-DD` form.
///
/// ISO dates order lexicographically, so validated values can be compared as
/// strings and used directly in SQL range predicates.
pub fn validate_iso_date(field: &'static str, value: &str) -> ValidationResult {
    let invalid = || ValidationError::InvalidFormat {
        field,
        value: value.to_string(),
    };
    let caps = ISO_DATE_RE.captures(value).ok_or_else(invalid)?;
    let year: u32 = caps[1].parse().map_err(|_| invalid())?;
    let month: u32 = caps[2].parse().map_err(|_| invalid())?;
    let day: u32 = caps[3].parse().map_err(|_| invalid())?;

    if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
        return Err(invalid());
    }
    Ok(())
}

/// Validates `from <= to` for two already-valid ISO dates.
pub fn validate_date_order(field: &'static str, from: &str, to: &str) -> ValidationResult {
    if from > to {
        return Err(ValidationError::OutOfRange {
            field,
            message: format!("ends before it starts ({from} > {to})"),
        });
    }
    Ok(())
}

fn matches_format(field: &'static str, value: &str, re: &Regex) -> ValidationResult {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field,
            value: value.to_string(),
        })
    }
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
