//! Teaching staff use-cases.

use crate::model::teacher::{Teacher, TeacherId};
use crate::repo::teacher_repo::TeacherRepository;
use crate::service::{authorize, found, ServiceResult};
use crate::tenant::{Permission, Principal};
use log::info;

pub struct TeacherService<R: TeacherRepository> {
    repo: R,
    principal: Principal,
}

impl<R: TeacherRepository> TeacherService<R> {
    pub fn new(repo: R, principal: Principal) -> Self {
        Self { repo, principal }
    }

    pub fn hire(&self, teacher: &Teacher) -> ServiceResult<Teacher> {
        authorize(&self.principal, Permission::ManageTeachers)?;
        let stored = self.repo.create_teacher(teacher)?;
        info!(
            "event=teacher_hire module=service status=ok teacher_id={}",
            stored.uuid
        );
        Ok(stored)
    }

    pub fn update(&self, teacher: &Teacher) -> ServiceResult<Teacher> {
        authorize(&self.principal, Permission::ManageTeachers)?;
        found(
            self.repo.get_teacher(teacher.uuid, false)?,
            "teacher",
            teacher.uuid,
        )?;
        Ok(self.repo.update_teacher(teacher)?)
    }

    pub fn remove(&self, id: TeacherId) -> ServiceResult<()> {
        authorize(&self.principal, Permission::ManageTeachers)?;
        self.repo.soft_delete_teacher(id)?;
        info!("event=teacher_remove module=service status=ok teacher_id={id}");
        Ok(())
    }

    pub fn get(&self, id: TeacherId) -> ServiceResult<Teacher> {
        found(self.repo.get_teacher(id, false)?, "teacher", id)
    }

    pub fn list(&self, limit: Option<u32>, offset: u32) -> ServiceResult<Vec<Teacher>> {
        Ok(self.repo.list_teachers(limit, offset)?)
    }
}
