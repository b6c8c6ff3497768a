//! Student admission use-cases.

use crate::model::student::{Student, StudentId};
use crate::repo::student_repo::{StudentListQuery, StudentRepository};
use crate::service::{authorize, found, ServiceResult};
use crate::tenant::{Permission, Principal};
use log::info;

pub struct StudentService<R: StudentRepository> {
    repo: R,
    principal: Principal,
}

impl<R: StudentRepository> StudentService<R> {
    pub fn new(repo: R, principal: Principal) -> Self {
        Self { repo, principal }
    }

    /// Admits a student into the caller's merchant.
    pub fn admit(&self, student: &Student) -> ServiceResult<Student> {
        authorize(&self.principal, Permission::ManageStudents)?;
        let stored = self.repo.create_student(student)?;
        info!(
            "event=student_admit module=service status=ok student_id={}",
            stored.uuid
        );
        Ok(stored)
    }

    /// Replaces the profile of an enrolled student.
    pub fn update(&self, student: &Student) -> ServiceResult<Student> {
        authorize(&self.principal, Permission::ManageStudents)?;
        found(
            self.repo.get_student(student.uuid, false)?,
            "student",
            student.uuid,
        )?;
        Ok(self.repo.update_student(student)?)
    }

    /// Withdraws a student; history (attendance, fees) stays readable.
    pub fn withdraw(&self, id: StudentId) -> ServiceResult<()> {
        authorize(&self.principal, Permission::ManageStudents)?;
        self.repo.soft_delete_student(id)?;
        info!("event=student_withdraw module=service status=ok student_id={id}");
        Ok(())
    }

    pub fn get(&self, id: StudentId) -> ServiceResult<Student> {
        found(self.repo.get_student(id, false)?, "student", id)
    }

    pub fn list(&self, query: &StudentListQuery) -> ServiceResult<Vec<Student>> {
        Ok(self.repo.list_students(query)?)
    }
}
