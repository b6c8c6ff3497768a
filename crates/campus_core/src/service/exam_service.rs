//! Exam, paper and mark use-cases over the review workflow.
//!
//! # Responsibility
//! - Create and edit reviewable records while they are editable.
//! - Drive review transitions and persist their result.
//! - Enforce the rules tying the three workflows together.
//!
//! # Invariants
//! - New records start in `Draft` whatever the caller passes.
//! - Editing a `Rejected` record moves it back to `Draft`.
//! - Marks are recorded only on an `Approved` paper.
//! - A paper locks only when all its marks are approved or locked, and
//!   locking it locks them.
//! - An exam locks only when it has papers and all of them are locked.

use crate::model::exam::{
    Exam, ExamId, ExamMark, ExamMarkId, ExamPaper, ExamPaperId, MarkEntry, PaperResult,
};
use crate::model::now_epoch_ms;
use crate::model::review::{ReviewAction, ReviewState, ReviewStatus, ReviewSubject};
use crate::model::student::StudentId;
use crate::repo::exam_repo::ExamRepository;
use crate::repo::student_repo::StudentRepository;
use crate::service::{authorize, found, ServiceError, ServiceResult};
use crate::tenant::{Permission, Principal};
use log::{info, warn};
use uuid::Uuid;

pub struct ExamService<R: ExamRepository, S: StudentRepository> {
    exams: R,
    students: S,
    principal: Principal,
}

impl<R: ExamRepository, S: StudentRepository> ExamService<R, S> {
    pub fn new(exams: R, students: S, principal: Principal) -> Self {
        Self {
            exams,
            students,
            principal,
        }
    }

    pub fn create_exam(&self, exam: &Exam) -> ServiceResult<Exam> {
        authorize(&self.principal, Permission::ManageExams)?;
        let stored = self.exams.create_exam(&Exam {
            review: ReviewState::default(),
            ..exam.clone()
        })?;
        info!(
            "event=exam_create module=service status=ok exam_id={}",
            stored.uuid
        );
        Ok(stored)
    }

    /// Replaces exam content; the workflow columns are kept.
    pub fn update_exam(&self, exam: &Exam) -> ServiceResult<Exam> {
        authorize(&self.principal, Permission::ManageExams)?;
        let stored = self.get_exam(exam.uuid)?;
        let review = reopen(ReviewSubject::Exam, exam.uuid, &stored.review)?;
        Ok(self.exams.update_exam(&Exam {
            review,
            ..exam.clone()
        })?)
    }

    pub fn transition_exam(
        &self,
        id: ExamId,
        action: ReviewAction,
        note: Option<&str>,
    ) -> ServiceResult<Exam> {
        let exam = self.get_exam(id)?;
        let next = self.step(ReviewSubject::Exam, id, &exam.review, action, note)?;

        if action == ReviewAction::Lock {
            let papers = self.exams.list_papers(id)?;
            if papers.is_empty() {
                return Err(ServiceError::RuleViolation(format!(
                    "exam {id} has no papers to lock"
                )));
            }
            if let Some(open) = papers
                .iter()
                .find(|paper| paper.review.status != ReviewStatus::Locked)
            {
                return Err(ServiceError::RuleViolation(format!(
                    "paper {} of exam {id} is still {}",
                    open.uuid,
                    open.review.status.as_str()
                )));
            }
        }

        self.exams.save_review(ReviewSubject::Exam, id, &next)?;
        log_transition(ReviewSubject::Exam, id, action, &exam.review, &next);
        Ok(Exam {
            review: next,
            ..exam
        })
    }

    pub fn get_exam(&self, id: ExamId) -> ServiceResult<Exam> {
        found(self.exams.get_exam(id)?, "exam", id)
    }

    pub fn list_exams(&self, term: Option<&str>) -> ServiceResult<Vec<Exam>> {
        Ok(self.exams.list_exams(term)?)
    }

    /// Adds a subject paper to an exam that is not locked.
    pub fn add_paper(&self, paper: &ExamPaper) -> ServiceResult<ExamPaper> {
        authorize(&self.principal, Permission::AuthorExamPapers)?;
        let exam = self.get_exam(paper.exam_id)?;
        if exam.review.status == ReviewStatus::Locked {
            return Err(ServiceError::RuleViolation(format!(
                "exam {} is locked",
                exam.uuid
            )));
        }

        let stored = self.exams.create_paper(&ExamPaper {
            merchant_id: exam.merchant_id,
            review: ReviewState::default(),
            ..paper.clone()
        })?;
        info!(
            "event=exam_paper_create module=service status=ok exam_id={} paper_id={}",
            stored.exam_id, stored.uuid
        );
        Ok(stored)
    }

    /// Replaces paper content; the owning exam never changes.
    pub fn update_paper(&self, paper: &ExamPaper) -> ServiceResult<ExamPaper> {
        authorize(&self.principal, Permission::AuthorExamPapers)?;
        let stored = self.get_paper(paper.uuid)?;
        let review = reopen(ReviewSubject::ExamPaper, paper.uuid, &stored.review)?;
        Ok(self.exams.update_paper(&ExamPaper {
            exam_id: stored.exam_id,
            review,
            ..paper.clone()
        })?)
    }

    pub fn transition_paper(
        &self,
        id: ExamPaperId,
        action: ReviewAction,
        note: Option<&str>,
    ) -> ServiceResult<ExamPaper> {
        let paper = self.get_paper(id)?;
        let next = self.step(ReviewSubject::ExamPaper, id, &paper.review, action, note)?;

        if action == ReviewAction::Lock {
            let marks = self.exams.list_marks(id)?;
            if let Some(open) = marks.iter().find(|mark| {
                !matches!(
                    mark.review.status,
                    ReviewStatus::Approved | ReviewStatus::Locked
                )
            }) {
                return Err(ServiceError::RuleViolation(format!(
                    "mark {} on paper {id} is still {}",
                    open.uuid,
                    open.review.status.as_str()
                )));
            }
            let locked = self.exams.lock_paper_with_marks(id, &next)?;
            info!(
                "event=exam_paper_lock module=service status=ok paper_id={id} marks_locked={locked}"
            );
        } else {
            self.exams.save_review(ReviewSubject::ExamPaper, id, &next)?;
        }

        log_transition(ReviewSubject::ExamPaper, id, action, &paper.review, &next);
        Ok(ExamPaper {
            review: next,
            ..paper
        })
    }

    pub fn get_paper(&self, id: ExamPaperId) -> ServiceResult<ExamPaper> {
        found(self.exams.get_paper(id)?, "exam_paper", id)
    }

    pub fn list_papers(&self, exam_id: ExamId) -> ServiceResult<Vec<ExamPaper>> {
        Ok(self.exams.list_papers(exam_id)?)
    }

    /// Records or corrects one student's score on an approved paper.
    pub fn record_mark(
        &self,
        paper_id: ExamPaperId,
        student_id: StudentId,
        entry: MarkEntry,
    ) -> ServiceResult<ExamMark> {
        authorize(&self.principal, Permission::EnterMarks)?;
        let paper = self.get_paper(paper_id)?;
        if paper.review.status != ReviewStatus::Approved {
            return Err(ServiceError::RuleViolation(format!(
                "paper {paper_id} is {}; marks need an approved paper",
                paper.review.status.as_str()
            )));
        }
        found(
            self.students.get_student(student_id, false)?,
            "student",
            student_id,
        )?;

        match self.exams.find_mark(paper_id, student_id)? {
            Some(existing) => {
                let review = reopen(ReviewSubject::ExamMark, existing.uuid, &existing.review)?;
                let mark = ExamMark {
                    entry,
                    review,
                    ..existing
                };
                mark.validate_against(&paper)?;
                Ok(self.exams.update_mark(&mark)?)
            }
            None => {
                let mut mark = ExamMark::new(paper_id, student_id, entry);
                mark.merchant_id = paper.merchant_id;
                mark.validate_against(&paper)?;
                Ok(self.exams.create_mark(&mark)?)
            }
        }
    }

    pub fn transition_mark(
        &self,
        id: ExamMarkId,
        action: ReviewAction,
        note: Option<&str>,
    ) -> ServiceResult<ExamMark> {
        let mark = self.get_mark(id)?;
        let next = self.step(ReviewSubject::ExamMark, id, &mark.review, action, note)?;
        self.exams.save_review(ReviewSubject::ExamMark, id, &next)?;
        log_transition(ReviewSubject::ExamMark, id, action, &mark.review, &next);
        Ok(ExamMark {
            review: next,
            ..mark
        })
    }

    pub fn get_mark(&self, id: ExamMarkId) -> ServiceResult<ExamMark> {
        found(self.exams.get_mark(id)?, "exam_mark", id)
    }

    pub fn list_marks(&self, paper_id: ExamPaperId) -> ServiceResult<Vec<ExamMark>> {
        Ok(self.exams.list_marks(paper_id)?)
    }

    /// Grades every recorded mark of a paper against its pass marks.
    pub fn paper_results(&self, paper_id: ExamPaperId) -> ServiceResult<Vec<PaperResult>> {
        let paper = self.get_paper(paper_id)?;
        let marks = self.exams.list_marks(paper_id)?;
        Ok(marks
            .iter()
            .map(|mark| PaperResult::grade(&paper, mark))
            .collect())
    }

    fn step(
        &self,
        subject: ReviewSubject,
        id: Uuid,
        current: &ReviewState,
        action: ReviewAction,
        note: Option<&str>,
    ) -> ServiceResult<ReviewState> {
        current
            .transition(
                subject,
                action,
                self.principal.role,
                self.principal.user_id,
                note,
                now_epoch_ms(),
            )
            .map_err(|err| {
                warn!(
                    "event=review_transition module=service status=error subject={} record_id={} action={} from={} role={}",
                    subject.as_str(),
                    id,
                    action.as_str(),
                    current.status.as_str(),
                    self.principal.role.as_str()
                );
                ServiceError::from(err)
            })
    }
}

/// Returns the workflow state of a record about to be edited.
fn reopen(subject: ReviewSubject, id: Uuid, stored: &ReviewState) -> ServiceResult<ReviewState> {
    if !stored.status.is_editable() {
        return Err(ServiceError::RuleViolation(format!(
            "{} {id} is {} and cannot be edited",
            subject.as_str(),
            stored.status.as_str()
        )));
    }
    Ok(ReviewState {
        status: ReviewStatus::Draft,
        ..stored.clone()
    })
}

fn log_transition(
    subject: ReviewSubject,
    id: Uuid,
    action: ReviewAction,
    from: &ReviewState,
    to: &ReviewState,
) {
    info!(
        "event=review_transition module=service status=ok subject={} record_id={} action={} from={} to={}",
        subject.as_str(),
        id,
        action.as_str(),
        from.status.as_str(),
        to.status.as_str()
    );
}
