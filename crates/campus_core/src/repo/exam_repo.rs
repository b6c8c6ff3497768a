//! Exam, exam paper and exam mark persistence.
//!
//! # Responsibility
//! - Store the three reviewable records and their workflow columns.
//! - Apply paper locking together with its approved marks atomically.
//!
//! # Invariants
//! - Papers reference an exam of the same merchant; marks reference a paper
//!   and an active student of the same merchant.
//! - Persisted marks are either absent with no score or scored.
//! - Workflow legality is decided by services; this layer stores the result.

use crate::model::exam::{Exam, ExamId, ExamMark, ExamMarkId, ExamPaper, ExamPaperId, MarkEntry};
use crate::model::review::{ReviewState, ReviewStatus, ReviewSubject};
use crate::model::student::StudentId;
use crate::repo::{
    ensure_owned, ensure_schema_ready, flag, map_write_error, optional_text, parse_enum,
    parse_flag, parse_optional_uuid, parse_uuid, text, RepoError, RepoResult, ScopedQuery,
};
use crate::tenant::{MerchantId, TenantContext};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const EXAM_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    title,
    term,
    starts_on,
    ends_on,
    status,
    review_note,
    reviewed_by,
    reviewed_at
FROM exams";

const PAPER_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    exam_id,
    subject,
    teacher_id,
    max_marks,
    pass_marks,
    status,
    review_note,
    reviewed_by,
    reviewed_at
FROM exam_papers";

const MARK_SELECT_SQL: &str = "SELECT
    uuid,
    merchant_id,
    paper_id,
    student_id,
    marks_obtained,
    is_absent,
    status,
    review_note,
    reviewed_by,
    reviewed_at
FROM exam_marks";

pub trait ExamRepository {
    fn create_exam(&self, exam: &Exam) -> RepoResult<Exam>;
    fn get_exam(&self, id: ExamId) -> RepoResult<Option<Exam>>;
    fn list_exams(&self, term: Option<&str>) -> RepoResult<Vec<Exam>>;
    /// Replaces exam content and workflow columns.
    fn update_exam(&self, exam: &Exam) -> RepoResult<Exam>;

    fn create_paper(&self, paper: &ExamPaper) -> RepoResult<ExamPaper>;
    fn get_paper(&self, id: ExamPaperId) -> RepoResult<Option<ExamPaper>>;
    fn list_papers(&self, exam_id: ExamId) -> RepoResult<Vec<ExamPaper>>;
    fn update_paper(&self, paper: &ExamPaper) -> RepoResult<ExamPaper>;

    fn create_mark(&self, mark: &ExamMark) -> RepoResult<ExamMark>;
    fn get_mark(&self, id: ExamMarkId) -> RepoResult<Option<ExamMark>>;
    fn find_mark(&self, paper_id: ExamPaperId, student_id: StudentId)
        -> RepoResult<Option<ExamMark>>;
    fn list_marks(&self, paper_id: ExamPaperId) -> RepoResult<Vec<ExamMark>>;
    fn update_mark(&self, mark: &ExamMark) -> RepoResult<ExamMark>;

    /// Persists workflow columns only.
    fn save_review(&self, subject: ReviewSubject, id: Uuid, review: &ReviewState)
        -> RepoResult<()>;
    /// Stores the paper's locked state and locks its approved marks in one
    /// transaction. Returns the number of marks locked.
    fn lock_paper_with_marks(&self, paper_id: ExamPaperId, review: &ReviewState)
        -> RepoResult<usize>;
}

pub struct SqliteExamRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteExamRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }

    /// Resolves the merchant a record keeps on update.
    fn guarded_merchant(
        &self,
        subject: ReviewSubject,
        id: Uuid,
        requested: Option<MerchantId>,
    ) -> RepoResult<MerchantId> {
        let stored = ScopedQuery::select(
            &format!("SELECT merchant_id FROM {}", subject.table()),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .fetch_optional(self.conn, |row| {
            let merchant_text: String = row.get("merchant_id")?;
            parse_uuid(&merchant_text, "merchant_id")
        })?
        .ok_or(RepoError::NotFound {
            entity: subject.as_str(),
            id,
        })?;

        Ok(self
            .tenant
            .guard_update(subject.table(), id, stored, requested)?)
    }

    fn save_review_on(
        &self,
        conn: &Connection,
        subject: ReviewSubject,
        id: Uuid,
        review: &ReviewState,
    ) -> RepoResult<()> {
        let changed = ScopedQuery::mutate(
            &format!(
                "UPDATE {}
                 SET
                    status = ?,
                    review_note = ?,
                    reviewed_by = ?,
                    reviewed_at = ?,
                    updated_at = (strftime('%s', 'now') * 1000)",
                subject.table()
            ),
            review_binds(review),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .execute(conn)?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: subject.as_str(),
                id,
            });
        }
        Ok(())
    }
}

impl ExamRepository for SqliteExamRepository<'_> {
    fn create_exam(&self, exam: &Exam) -> RepoResult<Exam> {
        exam.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(exam.merchant_id)?;
        let review = &exam.review;

        self.conn.execute(
            "INSERT INTO exams (
                uuid,
                merchant_id,
                title,
                term,
                starts_on,
                ends_on,
                status,
                review_note,
                reviewed_by,
                reviewed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                exam.uuid.to_string(),
                merchant_id.to_string(),
                exam.title.as_str(),
                exam.term.as_str(),
                exam.starts_on.as_str(),
                exam.ends_on.as_str(),
                review.status.as_str(),
                review.review_note.as_deref(),
                review.reviewed_by.map(|id| id.to_string()),
                review.reviewed_at,
            ],
        )?;

        Ok(Exam {
            merchant_id: Some(merchant_id),
            ..exam.clone()
        })
    }

    fn get_exam(&self, id: ExamId) -> RepoResult<Option<Exam>> {
        ScopedQuery::select(EXAM_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("uuid", text(id.to_string()))
            .fetch_optional(self.conn, parse_exam_row)
    }

    fn list_exams(&self, term: Option<&str>) -> RepoResult<Vec<Exam>> {
        ScopedQuery::select(EXAM_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq_opt("term", term.map(text))
            .order_by("starts_on DESC, uuid ASC")
            .fetch_all(self.conn, parse_exam_row)
    }

    fn update_exam(&self, exam: &Exam) -> RepoResult<Exam> {
        exam.validate()?;
        let merchant_id = self.guarded_merchant(ReviewSubject::Exam, exam.uuid, exam.merchant_id)?;

        let mut binds = vec![
            text(exam.title.as_str()),
            text(exam.term.as_str()),
            text(exam.starts_on.as_str()),
            text(exam.ends_on.as_str()),
        ];
        binds.extend(review_binds(&exam.review));
        ScopedQuery::mutate(
            "UPDATE exams
             SET
                title = ?,
                term = ?,
                starts_on = ?,
                ends_on = ?,
                status = ?,
                review_note = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            binds,
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(exam.uuid.to_string()))
        .execute(self.conn)?;

        Ok(Exam {
            merchant_id: Some(merchant_id),
            ..exam.clone()
        })
    }

    fn create_paper(&self, paper: &ExamPaper) -> RepoResult<ExamPaper> {
        paper.validate()?;
        let merchant_id = self.tenant.scope.resolve_insert(paper.merchant_id)?;
        ensure_owned(self.conn, "exams", "exam", paper.exam_id, merchant_id)?;
        if let Some(teacher_id) = paper.teacher_id {
            ensure_owned(self.conn, "teachers", "teacher", teacher_id, merchant_id)?;
        }
        let review = &paper.review;

        self.conn
            .execute(
                "INSERT INTO exam_papers (
                    uuid,
                    merchant_id,
                    exam_id,
                    subject,
                    teacher_id,
                    max_marks,
                    pass_marks,
                    status,
                    review_note,
                    reviewed_by,
                    reviewed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    paper.uuid.to_string(),
                    merchant_id.to_string(),
                    paper.exam_id.to_string(),
                    paper.subject.as_str(),
                    paper.teacher_id.map(|id| id.to_string()),
                    paper.max_marks,
                    paper.pass_marks,
                    review.status.as_str(),
                    review.review_note.as_deref(),
                    review.reviewed_by.map(|id| id.to_string()),
                    review.reviewed_at,
                ],
            )
            .map_err(|err| map_write_error(err, "subject already has a paper in this exam"))?;

        Ok(ExamPaper {
            merchant_id: Some(merchant_id),
            ..paper.clone()
        })
    }

    fn get_paper(&self, id: ExamPaperId) -> RepoResult<Option<ExamPaper>> {
        ScopedQuery::select(PAPER_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("uuid", text(id.to_string()))
            .fetch_optional(self.conn, parse_paper_row)
    }

    fn list_papers(&self, exam_id: ExamId) -> RepoResult<Vec<ExamPaper>> {
        ScopedQuery::select(PAPER_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("exam_id", text(exam_id.to_string()))
            .order_by("subject ASC, uuid ASC")
            .fetch_all(self.conn, parse_paper_row)
    }

    fn update_paper(&self, paper: &ExamPaper) -> RepoResult<ExamPaper> {
        paper.validate()?;
        let merchant_id =
            self.guarded_merchant(ReviewSubject::ExamPaper, paper.uuid, paper.merchant_id)?;
        if let Some(teacher_id) = paper.teacher_id {
            ensure_owned(self.conn, "teachers", "teacher", teacher_id, merchant_id)?;
        }

        let mut binds = vec![
            text(paper.subject.as_str()),
            paper
                .teacher_id
                .map_or(Value::Null, |id| text(id.to_string())),
            Value::Integer(i64::from(paper.max_marks)),
            Value::Integer(i64::from(paper.pass_marks)),
        ];
        binds.extend(review_binds(&paper.review));
        ScopedQuery::mutate(
            "UPDATE exam_papers
             SET
                subject = ?,
                teacher_id = ?,
                max_marks = ?,
                pass_marks = ?,
                status = ?,
                review_note = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            binds,
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(paper.uuid.to_string()))
        .execute(self.conn)
        .map_err(|err| map_write_error(err, "subject already has a paper in this exam"))?;

        Ok(ExamPaper {
            merchant_id: Some(merchant_id),
            ..paper.clone()
        })
    }

    fn create_mark(&self, mark: &ExamMark) -> RepoResult<ExamMark> {
        let merchant_id = self.tenant.scope.resolve_insert(mark.merchant_id)?;
        ensure_owned(self.conn, "exam_papers", "exam_paper", mark.paper_id, merchant_id)?;
        ensure_owned(self.conn, "students", "student", mark.student_id, merchant_id)?;
        let review = &mark.review;

        self.conn
            .execute(
                "INSERT INTO exam_marks (
                    uuid,
                    merchant_id,
                    paper_id,
                    student_id,
                    marks_obtained,
                    is_absent,
                    status,
                    review_note,
                    reviewed_by,
                    reviewed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    mark.uuid.to_string(),
                    merchant_id.to_string(),
                    mark.paper_id.to_string(),
                    mark.student_id.to_string(),
                    mark.marks_obtained(),
                    mark.entry == MarkEntry::Absent,
                    review.status.as_str(),
                    review.review_note.as_deref(),
                    review.reviewed_by.map(|id| id.to_string()),
                    review.reviewed_at,
                ],
            )
            .map_err(|err| map_write_error(err, "student already has a mark on this paper"))?;

        Ok(ExamMark {
            merchant_id: Some(merchant_id),
            ..mark.clone()
        })
    }

    fn get_mark(&self, id: ExamMarkId) -> RepoResult<Option<ExamMark>> {
        ScopedQuery::select(MARK_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("uuid", text(id.to_string()))
            .fetch_optional(self.conn, parse_mark_row)
    }

    fn find_mark(
        &self,
        paper_id: ExamPaperId,
        student_id: StudentId,
    ) -> RepoResult<Option<ExamMark>> {
        ScopedQuery::select(MARK_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("paper_id", text(paper_id.to_string()))
            .eq("student_id", text(student_id.to_string()))
            .fetch_optional(self.conn, parse_mark_row)
    }

    fn list_marks(&self, paper_id: ExamPaperId) -> RepoResult<Vec<ExamMark>> {
        ScopedQuery::select(MARK_SELECT_SQL, "merchant_id", &self.tenant.scope)
            .eq("paper_id", text(paper_id.to_string()))
            .order_by("student_id ASC")
            .fetch_all(self.conn, parse_mark_row)
    }

    fn update_mark(&self, mark: &ExamMark) -> RepoResult<ExamMark> {
        let merchant_id =
            self.guarded_merchant(ReviewSubject::ExamMark, mark.uuid, mark.merchant_id)?;

        let mut binds = vec![
            mark.marks_obtained()
                .map_or(Value::Null, |value| Value::Integer(i64::from(value))),
            flag(mark.entry == MarkEntry::Absent),
        ];
        binds.extend(review_binds(&mark.review));
        ScopedQuery::mutate(
            "UPDATE exam_marks
             SET
                marks_obtained = ?,
                is_absent = ?,
                status = ?,
                review_note = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            binds,
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(mark.uuid.to_string()))
        .execute(self.conn)?;

        Ok(ExamMark {
            merchant_id: Some(merchant_id),
            ..mark.clone()
        })
    }

    fn save_review(
        &self,
        subject: ReviewSubject,
        id: Uuid,
        review: &ReviewState,
    ) -> RepoResult<()> {
        self.save_review_on(self.conn, subject, id, review)
    }

    fn lock_paper_with_marks(
        &self,
        paper_id: ExamPaperId,
        review: &ReviewState,
    ) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = ScopedQuery::mutate(
            "UPDATE exam_papers
             SET
                status = ?,
                review_note = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            review_binds(review),
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("uuid", text(paper_id.to_string()))
        .and(
            "NOT EXISTS (
                SELECT 1 FROM exam_marks
                WHERE exam_marks.paper_id = exam_papers.uuid
                  AND exam_marks.status NOT IN ('approved', 'locked')
            )",
            [],
        )
        .execute(&tx)?;

        if changed == 0 {
            let exists = ScopedQuery::select(
                "SELECT uuid FROM exam_papers",
                "merchant_id",
                &self.tenant.scope,
            )
            .eq("uuid", text(paper_id.to_string()))
            .fetch_optional(&tx, |_| Ok(()))?
            .is_some();
            if !exists {
                return Err(RepoError::NotFound {
                    entity: ReviewSubject::ExamPaper.as_str(),
                    id: paper_id,
                });
            }
            return Err(RepoError::Conflict(format!(
                "paper {paper_id} still has marks awaiting approval"
            )));
        }

        let locked = ScopedQuery::mutate(
            "UPDATE exam_marks
             SET
                status = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = (strftime('%s', 'now') * 1000)",
            vec![
                text(ReviewStatus::Locked.as_str()),
                review
                    .reviewed_by
                    .map_or(Value::Null, |id| text(id.to_string())),
                review.reviewed_at.map_or(Value::Null, Value::Integer),
            ],
            "merchant_id",
            &self.tenant.scope,
        )
        .eq("paper_id", text(paper_id.to_string()))
        .eq("status", text(ReviewStatus::Approved.as_str()))
        .execute(&tx)?;

        tx.commit()?;
        Ok(locked)
    }
}

/// Binds `status, review_note, reviewed_by, reviewed_at` in that order.
fn review_binds(review: &ReviewState) -> Vec<Value> {
    vec![
        text(review.status.as_str()),
        optional_text(review.review_note.as_deref()),
        review
            .reviewed_by
            .map_or(Value::Null, |id| text(id.to_string())),
        review.reviewed_at.map_or(Value::Null, Value::Integer),
    ]
}

fn parse_review(row: &Row<'_>, table: &str) -> RepoResult<ReviewState> {
    let status_text: String = row.get("status")?;
    Ok(ReviewState {
        status: parse_enum(&status_text, &format!("{table}.status"), ReviewStatus::parse)?,
        review_note: row.get("review_note")?,
        reviewed_by: parse_optional_uuid(row.get("reviewed_by")?, &format!("{table}.reviewed_by"))?,
        reviewed_at: row.get("reviewed_at")?,
    })
}

fn parse_merchant(row: &Row<'_>, table: &str) -> RepoResult<Option<MerchantId>> {
    let merchant_text: String = row.get("merchant_id")?;
    Ok(Some(parse_uuid(&merchant_text, &format!("{table}.merchant_id"))?))
}

fn parse_exam_row(row: &Row<'_>) -> RepoResult<Exam> {
    let uuid_text: String = row.get("uuid")?;
    let exam = Exam {
        uuid: parse_uuid(&uuid_text, "exams.uuid")?,
        merchant_id: parse_merchant(row, "exams")?,
        title: row.get("title")?,
        term: row.get("term")?,
        starts_on: row.get("starts_on")?,
        ends_on: row.get("ends_on")?,
        review: parse_review(row, "exams")?,
    };
    exam.validate()?;
    Ok(exam)
}

fn parse_paper_row(row: &Row<'_>) -> RepoResult<ExamPaper> {
    let uuid_text: String = row.get("uuid")?;
    let exam_text: String = row.get("exam_id")?;
    let paper = ExamPaper {
        uuid: parse_uuid(&uuid_text, "exam_papers.uuid")?,
        merchant_id: parse_merchant(row, "exam_papers")?,
        exam_id: parse_uuid(&exam_text, "exam_papers.exam_id")?,
        subject: row.get("subject")?,
        teacher_id: parse_optional_uuid(row.get("teacher_id")?, "exam_papers.teacher_id")?,
        max_marks: row.get("max_marks")?,
        pass_marks: row.get("pass_marks")?,
        review: parse_review(row, "exam_papers")?,
    };
    paper.validate()?;
    Ok(paper)
}

fn parse_mark_row(row: &Row<'_>) -> RepoResult<ExamMark> {
    let uuid_text: String = row.get("uuid")?;
    let paper_text: String = row.get("paper_id")?;
    let student_text: String = row.get("student_id")?;
    let is_absent = parse_flag(row.get("is_absent")?, "exam_marks.is_absent")?;
    let entry = match (is_absent, row.get::<_, Option<u32>>("marks_obtained")?) {
        (true, None) => MarkEntry::Absent,
        (false, Some(value)) => MarkEntry::Scored(value),
        (absent, value) => {
            return Err(RepoError::InvalidData(format!(
                "inconsistent mark in exam_marks: is_absent={absent} marks_obtained={value:?}"
            )));
        }
    };

    Ok(ExamMark {
        uuid: parse_uuid(&uuid_text, "exam_marks.uuid")?,
        merchant_id: parse_merchant(row, "exam_marks")?,
        paper_id: parse_uuid(&paper_text, "exam_marks.paper_id")?,
        student_id: parse_uuid(&student_text, "exam_marks.student_id")?,
        entry,
        review: parse_review(row, "exam_marks")?,
    })
}
