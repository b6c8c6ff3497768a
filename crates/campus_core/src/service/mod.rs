//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Check the caller's permission before every write.
//! - Enforce cross-record business rules (review gating, fee balances).
//!
//! # Invariants
//! - Services hold the acting [`Principal`]; repositories hold its scope.
//! - Service APIs never bypass repository validation/persistence contracts.

pub mod attendance_service;
pub mod certificate_service;
pub mod exam_service;
pub mod invoice_service;
pub mod merchant_service;
pub mod student_service;
pub mod teacher_service;

use crate::model::review::TransitionError;
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use crate::tenant::{require, Permission, PolicyError, Principal};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Use-case level error.
#[derive(Debug)]
pub enum ServiceError {
    /// Caller's role lacks the permission.
    Forbidden(PolicyError),
    /// Review workflow refused the action.
    Transition(TransitionError),
    NotFound { entity: &'static str, id: Uuid },
    Validation(ValidationError),
    /// A business rule spanning several records refused the operation.
    RuleViolation(String),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden(err) => write!(f, "forbidden: {err}"),
            Self::Transition(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::RuleViolation(message) => write!(f, "rule violation: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Forbidden(err) => Some(err),
            Self::Transition(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } | Self::RuleViolation(_) => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(value: TransitionError) -> Self {
        Self::Transition(value)
    }
}

impl From<PolicyError> for ServiceError {
    fn from(value: PolicyError) -> Self {
        Self::Forbidden(value)
    }
}

/// Permission gate shared by all services; denials are logged.
pub(crate) fn authorize(principal: &Principal, permission: Permission) -> ServiceResult<()> {
    require(principal, permission).map_err(|err| {
        warn!(
            "event=permission_denied module=service status=warn user_id={} role={} permission={}",
            principal.user_id,
            principal.role.as_str(),
            permission.as_str()
        );
        ServiceError::Forbidden(err)
    })
}

/// Turns an optional lookup into `NotFound`.
pub(crate) fn found<T>(value: Option<T>, entity: &'static str, id: Uuid) -> ServiceResult<T> {
    value.ok_or(ServiceError::NotFound { entity, id })
}
