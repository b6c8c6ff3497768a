//! Exam, exam paper and exam mark records.
//!
//! # Invariants
//! - `starts_on <= ends_on`.
//! - `0 <= pass_marks <= max_marks` and `max_marks > 0`.
//! - An absent mark has no score; a present mark scores `0..=max_marks`.

use crate::model::review::ReviewState;
use crate::model::student::StudentId;
use crate::model::teacher::TeacherId;
use crate::model::validation::{
    require_text, validate_date_order, validate_iso_date, ValidationError, ValidationResult,
};
use crate::tenant::MerchantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ExamId = Uuid;
pub type ExamPaperId = Uuid;
pub type ExamMarkId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub uuid: ExamId,
    pub merchant_id: Option<MerchantId>,
    pub title: String,
    /// Free-form academic term label, e.g. `2026-T1`.
    pub term: String,
    pub starts_on: String,
    pub ends_on: String,
    pub review: ReviewState,
}

impl Exam {
    pub fn new(
        title: impl Into<String>,
        term: impl Into<String>,
        starts_on: impl Into<String>,
        ends_on: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            title: title.into(),
            term: term.into(),
            starts_on: starts_on.into(),
            ends_on: ends_on.into(),
            review: ReviewState::default(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, 120)?;
        require_text("term", &self.term, 32)?;
        validate_iso_date("starts_on", &self.starts_on)?;
        validate_iso_date("ends_on", &self.ends_on)?;
        validate_date_order("exam", &self.starts_on, &self.ends_on)
    }
}

/// One subject paper of an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPaper {
    pub uuid: ExamPaperId,
    pub merchant_id: Option<MerchantId>,
    pub exam_id: ExamId,
    /// Unique within one exam.
    pub subject: String,
    /// Teacher responsible for setting and marking.
    pub teacher_id: Option<TeacherId>,
    pub max_marks: u32,
    pub pass_marks: u32,
    pub review: ReviewState,
}

impl ExamPaper {
    pub fn new(
        exam_id: ExamId,
        subject: impl Into<String>,
        max_marks: u32,
        pass_marks: u32,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            exam_id,
            subject: subject.into(),
            teacher_id: None,
            max_marks,
            pass_marks,
            review: ReviewState::default(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("subject", &self.subject, 80)?;
        if self.max_marks == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_marks",
                message: "must be positive".to_string(),
            });
        }
        if self.pass_marks > self.max_marks {
            return Err(ValidationError::OutOfRange {
                field: "pass_marks",
                message: format!("must not exceed max_marks ({})", self.max_marks),
            });
        }
        Ok(())
    }
}

/// Score input for one student on one paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkEntry {
    Scored(u32),
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamMark {
    pub uuid: ExamMarkId,
    pub merchant_id: Option<MerchantId>,
    pub paper_id: ExamPaperId,
    pub student_id: StudentId,
    pub entry: MarkEntry,
    pub review: ReviewState,
}

impl ExamMark {
    pub fn new(paper_id: ExamPaperId, student_id: StudentId, entry: MarkEntry) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            merchant_id: None,
            paper_id,
            student_id,
            entry,
            review: ReviewState::default(),
        }
    }

    /// Validates the score against the owning paper.
    pub fn validate_against(&self, paper: &ExamPaper) -> ValidationResult {
        match self.entry {
            MarkEntry::Scored(value) if value > paper.max_marks => {
                Err(ValidationError::OutOfRange {
                    field: "marks_obtained",
                    message: format!("{value} exceeds max_marks {}", paper.max_marks),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn marks_obtained(&self) -> Option<u32> {
        match self.entry {
            MarkEntry::Scored(value) => Some(value),
            MarkEntry::Absent => None,
        }
    }
}

/// Result line of one student on one paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperResult {
    pub student_id: StudentId,
    pub entry: MarkEntry,
    pub passed: bool,
}

impl PaperResult {
    /// Grades one mark. Absence is a fail.
    pub fn grade(paper: &ExamPaper, mark: &ExamMark) -> Self {
        let passed = mark
            .marks_obtained()
            .is_some_and(|value| value >= paper.pass_marks);
        Self {
            student_id: mark.student_id,
            entry: mark.entry,
            passed,
        }
    }
}
