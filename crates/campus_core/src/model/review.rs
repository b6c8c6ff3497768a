//! Review workflow shared by exams, exam papers and exam marks.
//!
//! # Responsibility
//! - Define the `draft -> submitted -> approved/rejected -> locked` state
//!   machine.
//! - Gate each action by subject and role.
//!
//! # Invariants
//! - `Locked` is terminal.
//! - A rejection always carries a non-empty note.
//! - Record content is editable only in `Draft` or `Rejected`.

use crate::tenant::{Role, UserId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Locked,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Locked => "locked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "locked" => Some(Self::Locked),
            _ => None,
        }
    }

    /// Whether the reviewed content may still change.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    /// Returns the status reached by `action`, if the edge exists.
    pub fn next(self, action: ReviewAction) -> Option<Self> {
        match (self, action) {
            (Self::Draft, ReviewAction::Submit) => Some(Self::Submitted),
            (Self::Submitted, ReviewAction::Approve) => Some(Self::Approved),
            (Self::Submitted, ReviewAction::Reject) => Some(Self::Rejected),
            (Self::Rejected, ReviewAction::Revise) => Some(Self::Draft),
            (Self::Approved, ReviewAction::Lock) => Some(Self::Locked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Submit,
    Approve,
    Reject,
    /// Reopens a rejected record for editing.
    Revise,
    Lock,
}

impl ReviewAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Revise => "revise",
            Self::Lock => "lock",
        }
    }

    /// Reviewer-side actions stamp `reviewed_by`/`reviewed_at`.
    fn is_review(self) -> bool {
        matches!(self, Self::Approve | Self::Reject | Self::Lock)
    }
}

/// Which record kind a transition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewSubject {
    Exam,
    ExamPaper,
    ExamMark,
}

impl ReviewSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exam => "exam",
            Self::ExamPaper => "exam_paper",
            Self::ExamMark => "exam_mark",
        }
    }

    /// Backing table of the subject.
    pub fn table(self) -> &'static str {
        match self {
            Self::Exam => "exams",
            Self::ExamPaper => "exam_papers",
            Self::ExamMark => "exam_marks",
        }
    }
}

/// Returns whether `role` may perform `action` on `subject`.
///
/// Exams are authored by administrators and reviewed by the principal.
/// Papers and marks are authored by teachers and reviewed by the principal
/// or an administrator.
pub fn is_authorized(subject: ReviewSubject, action: ReviewAction, role: Role) -> bool {
    if role == Role::SuperAdmin {
        return true;
    }

    let authoring = matches!(action, ReviewAction::Submit | ReviewAction::Revise);
    match (subject, authoring) {
        (ReviewSubject::Exam, true) => role == Role::Admin,
        (ReviewSubject::Exam, false) => role == Role::Principal,
        (_, true) => matches!(role, Role::Teacher | Role::Admin),
        (_, false) => matches!(role, Role::Principal | Role::Admin),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    Forbidden {
        subject: ReviewSubject,
        action: ReviewAction,
        role: Role,
    },
    InvalidTransition {
        from: ReviewStatus,
        action: ReviewAction,
    },
    MissingRejectionNote,
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden {
                subject,
                action,
                role,
            } => write!(
                f,
                "role `{}` may not {} a {}",
                role.as_str(),
                action.as_str(),
                subject.as_str()
            ),
            Self::InvalidTransition { from, action } => write!(
                f,
                "cannot {} a record in status `{}`",
                action.as_str(),
                from.as_str()
            ),
            Self::MissingRejectionNote => write!(f, "a rejection requires a note"),
        }
    }
}

impl Error for TransitionError {}

/// Workflow columns embedded in every reviewable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    pub status: ReviewStatus,
    /// Last reviewer note; required on rejection.
    pub review_note: Option<String>,
    pub reviewed_by: Option<UserId>,
    /// Epoch milliseconds of the last reviewer action.
    pub reviewed_at: Option<i64>,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            status: ReviewStatus::Draft,
            review_note: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }
}

impl ReviewState {
    /// Computes the state after `action` by `role`/`actor`.
    ///
    /// Pure: persisting the result is the caller's job.
    pub fn transition(
        &self,
        subject: ReviewSubject,
        action: ReviewAction,
        role: Role,
        actor: UserId,
        note: Option<&str>,
        now_ms: i64,
    ) -> Result<Self, TransitionError> {
        if !is_authorized(subject, action, role) {
            return Err(TransitionError::Forbidden {
                subject,
                action,
                role,
            });
        }

        let status = self
            .status
            .next(action)
            .ok_or(TransitionError::InvalidTransition {
                from: self.status,
                action,
            })?;

        let note = note.map(str::trim).filter(|value| !value.is_empty());
        if action == ReviewAction::Reject && note.is_none() {
            return Err(TransitionError::MissingRejectionNote);
        }

        let mut next = self.clone();
        next.status = status;
        if let Some(note) = note {
            next.review_note = Some(note.to_string());
        }
        if action.is_review() {
            next.reviewed_by = Some(actor);
            next.reviewed_at = Some(now_ms);
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_authorized, ReviewAction, ReviewState, ReviewStatus, ReviewSubject, TransitionError,
    };
    use crate::tenant::Role;
    use uuid::Uuid;

    const ACTIONS: [ReviewAction; 5] = [
        ReviewAction::Submit,
        ReviewAction::Approve,
        ReviewAction::Reject,
        ReviewAction::Revise,
        ReviewAction::Lock,
    ];

    #[test]
    fn happy_path_reaches_locked() {
        let actor = Uuid::new_v4();
        let draft = ReviewState::default();
        let submitted = draft
            .transition(
                ReviewSubject::ExamPaper,
                ReviewAction::Submit,
                Role::Teacher,
                actor,
                None,
                1,
            )
            .expect("submit");
        let approved = submitted
            .transition(
                ReviewSubject::ExamPaper,
                ReviewAction::Approve,
                Role::Principal,
                actor,
                None,
                2,
            )
            .expect("approve");
        assert_eq!(approved.reviewed_at, Some(2));
        let locked = approved
            .transition(
                ReviewSubject::ExamPaper,
                ReviewAction::Lock,
                Role::Admin,
                actor,
                None,
                3,
            )
            .expect("lock");
        assert_eq!(locked.status, ReviewStatus::Locked);
        assert!(!locked.status.is_editable());
    }

    #[test]
    fn locked_is_terminal() {
        for action in ACTIONS {
            assert_eq!(ReviewStatus::Locked.next(action), None, "{action:?}");
        }
    }

    #[test]
    fn rejected_can_only_be_revised() {
        let reachable: Vec<ReviewAction> = ACTIONS
            .into_iter()
            .filter(|action| ReviewStatus::Rejected.next(*action).is_some())
            .collect();
        assert_eq!(reachable, vec![ReviewAction::Revise]);
        assert_eq!(
            ReviewStatus::Rejected.next(ReviewAction::Revise),
            Some(ReviewStatus::Draft)
        );
    }

    #[test]
    fn rejection_requires_non_blank_note() {
        let submitted = ReviewState {
            status: ReviewStatus::Submitted,
            ..ReviewState::default()
        };
        let err = submitted
            .transition(
                ReviewSubject::ExamMark,
                ReviewAction::Reject,
                Role::Principal,
                Uuid::new_v4(),
                Some("  "),
                5,
            )
            .expect_err("blank note must fail");
        assert_eq!(err, TransitionError::MissingRejectionNote);

        let rejected = submitted
            .transition(
                ReviewSubject::ExamMark,
                ReviewAction::Reject,
                Role::Principal,
                Uuid::new_v4(),
                Some(" recount q4 "),
                5,
            )
            .expect("reject with note");
        assert_eq!(rejected.status, ReviewStatus::Rejected);
        assert_eq!(rejected.review_note.as_deref(), Some("recount q4"));
    }

    #[test]
    fn invalid_edge_reports_source_status() {
        let err = ReviewState::default()
            .transition(
                ReviewSubject::Exam,
                ReviewAction::Lock,
                Role::Principal,
                Uuid::new_v4(),
                None,
                0,
            )
            .expect_err("draft cannot be locked");
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: ReviewStatus::Draft,
                action: ReviewAction::Lock
            }
        );
    }

    #[test]
    fn exam_roles_are_split_between_admin_and_principal() {
        assert!(is_authorized(ReviewSubject::Exam, ReviewAction::Submit, Role::Admin));
        assert!(!is_authorized(ReviewSubject::Exam, ReviewAction::Submit, Role::Teacher));
        assert!(is_authorized(ReviewSubject::Exam, ReviewAction::Approve, Role::Principal));
        assert!(!is_authorized(ReviewSubject::Exam, ReviewAction::Approve, Role::Admin));
        assert!(is_authorized(ReviewSubject::Exam, ReviewAction::Lock, Role::SuperAdmin));
    }

    #[test]
    fn teachers_author_but_never_review_marks() {
        assert!(is_authorized(ReviewSubject::ExamMark, ReviewAction::Submit, Role::Teacher));
        assert!(is_authorized(ReviewSubject::ExamMark, ReviewAction::Revise, Role::Teacher));
        for action in [ReviewAction::Approve, ReviewAction::Reject, ReviewAction::Lock] {
            assert!(!is_authorized(ReviewSubject::ExamMark, action, Role::Teacher));
        }
        assert!(!is_authorized(
            ReviewSubject::ExamMark,
            ReviewAction::Submit,
            Role::Accountant
        ));
    }

    #[test]
    fn forbidden_check_precedes_transition_check() {
        let err = ReviewState::default()
            .transition(
                ReviewSubject::ExamPaper,
                ReviewAction::Approve,
                Role::Teacher,
                Uuid::new_v4(),
                None,
                0,
            )
            .expect_err("teacher cannot approve");
        assert!(matches!(
            err,
            TransitionError::Forbidden {
                role: Role::Teacher,
                ..
            }
        ));
    }
}
