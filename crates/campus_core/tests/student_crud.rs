use campus_core::model::merchant::Merchant;
use campus_core::model::student::Student;
use campus_core::model::teacher::Teacher;
use campus_core::repo::merchant_repo::{MerchantRepository, SqliteMerchantRepository};
use campus_core::repo::student_repo::{SqliteStudentRepository, StudentListQuery};
use campus_core::repo::teacher_repo::SqliteTeacherRepository;
use campus_core::service::merchant_service::MerchantService;
use campus_core::service::student_service::StudentService;
use campus_core::service::teacher_service::TeacherService;
use campus_core::{
    open_db_in_memory, MerchantId, Principal, RepoError, Role, ScopePolicy, ServiceError,
    TenantContext, TenantScope,
};
use rusqlite::Connection;

#[test]
fn admit_get_update_and_withdraw_student() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let service = student_service(&conn, merchant, Role::Admin);

    let mut student = Student::new("2026/014", "Meera Nair", "7");
    student.section = Some("B".to_string());
    student.guardian_phone = Some("+91 98450 12345".to_string());
    let admitted = service.admit(&student).unwrap();
    assert_eq!(admitted.merchant_id, Some(merchant));

    let loaded = service.get(admitted.uuid).unwrap();
    assert_eq!(loaded, admitted);

    let mut promoted = loaded.clone();
    promoted.class_name = "8".to_string();
    promoted.section = None;
    let updated = service.update(&promoted).unwrap();
    assert_eq!(updated.class_name, "8");
    assert_eq!(service.get(admitted.uuid).unwrap().section, None);

    service.withdraw(admitted.uuid).unwrap();
    assert!(matches!(
        service.get(admitted.uuid),
        Err(ServiceError::NotFound { entity: "student", .. })
    ));
    assert!(matches!(
        service.update(&promoted),
        Err(ServiceError::NotFound { .. })
    ));

    let with_withdrawn = service
        .list(&StudentListQuery {
            include_deleted: true,
            ..StudentListQuery::default()
        })
        .unwrap();
    assert_eq!(with_withdrawn.len(), 1);
    assert!(with_withdrawn[0].is_deleted);
}

#[test]
fn invalid_student_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let service = student_service(&conn, merchant, Role::Admin);

    let mut bad_phone = Student::new("A-1", "Meera Nair", "7");
    bad_phone.guardian_phone = Some("call me".to_string());
    assert!(matches!(
        service.admit(&bad_phone),
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        service.admit(&Student::new("", "Meera Nair", "7")),
        Err(ServiceError::Validation(_))
    ));
    assert!(service
        .list(&StudentListQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn list_filters_orders_and_paginates() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let service = student_service(&conn, merchant, Role::Principal);

    for (no, name, class_name, section) in [
        ("A-1", "Zoya Khan", "5", "A"),
        ("A-2", "Arjun Das", "5", "B"),
        ("A-3", "Kiran Shah", "5", "A"),
        ("A-4", "Bela Roy", "6", "A"),
    ] {
        let mut student = Student::new(no, name, class_name);
        student.section = Some(section.to_string());
        service.admit(&student).unwrap();
    }

    let class_five = service
        .list(&StudentListQuery {
            class_name: Some("5".to_string()),
            ..StudentListQuery::default()
        })
        .unwrap();
    let names: Vec<&str> = class_five.iter().map(|s| s.full_name.as_str()).collect();
    assert_eq!(names, ["Arjun Das", "Kiran Shah", "Zoya Khan"]);

    let five_a = service
        .list(&StudentListQuery {
            class_name: Some("5".to_string()),
            section: Some("A".to_string()),
            ..StudentListQuery::default()
        })
        .unwrap();
    assert_eq!(five_a.len(), 2);

    let second_page = service
        .list(&StudentListQuery {
            limit: Some(2),
            offset: 2,
            ..StudentListQuery::default()
        })
        .unwrap();
    let names: Vec<&str> = second_page.iter().map(|s| s.full_name.as_str()).collect();
    assert_eq!(names, ["Zoya Khan", "Bela Roy"]);
}

#[test]
fn roles_without_student_permission_are_forbidden() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");

    for role in [Role::Teacher, Role::Accountant] {
        let service = student_service(&conn, merchant, role);
        let err = service
            .admit(&Student::new("A-1", "Meera Nair", "7"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)), "{role:?}");
    }

    let admitted = student_service(&conn, merchant, Role::Admin)
        .admit(&Student::new("A-1", "Meera Nair", "7"))
        .unwrap();
    let teacher_view = student_service(&conn, merchant, Role::Teacher);
    assert_eq!(teacher_view.get(admitted.uuid).unwrap().uuid, admitted.uuid);
    assert!(matches!(
        teacher_view.withdraw(admitted.uuid),
        Err(ServiceError::Forbidden(_))
    ));
}

#[test]
fn teacher_lifecycle_and_duplicate_employee_number() {
    let conn = open_db_in_memory().unwrap();
    let merchant = seed_merchant(&conn, "DPS");
    let principal = Principal::member(merchant, Role::Principal);
    let repo = SqliteTeacherRepository::try_new(&conn, context(&principal)).unwrap();
    let service = TeacherService::new(repo, principal);

    let mut teacher = Teacher::new("EMP-7", "Farah Ali");
    teacher.email = Some("farah.ali@dps.example".to_string());
    let hired = service.hire(&teacher).unwrap();
    assert_eq!(hired.merchant_id, Some(merchant));

    let duplicate = service.hire(&Teacher::new("EMP-7", "Other Person")).unwrap_err();
    assert!(matches!(duplicate, ServiceError::Repo(RepoError::Conflict(_))));

    let mut bad_email = Teacher::new("EMP-8", "Nobody");
    bad_email.email = Some("not-an-email".to_string());
    assert!(matches!(
        service.hire(&bad_email),
        Err(ServiceError::Validation(_))
    ));

    let mut renamed = hired.clone();
    renamed.full_name = "Farah Ali Khan".to_string();
    service.update(&renamed).unwrap();
    assert_eq!(service.get(hired.uuid).unwrap().full_name, "Farah Ali Khan");
    assert_eq!(service.list(None, 0).unwrap().len(), 1);

    service.remove(hired.uuid).unwrap();
    assert!(matches!(
        service.get(hired.uuid),
        Err(ServiceError::NotFound { entity: "teacher", .. })
    ));
    assert!(service.list(None, 0).unwrap().is_empty());
}

#[test]
fn only_platform_operators_register_merchants() {
    let conn = open_db_in_memory().unwrap();
    let platform = Principal::platform();
    let service = MerchantService::new(
        SqliteMerchantRepository::try_new(&conn, context(&platform)).unwrap(),
        platform,
    );

    let school = service.register("dps-east", "DPS East").unwrap();
    assert_eq!(school.code, "DPS-EAST");
    assert_eq!(
        service.find_by_code("dps-east").unwrap().map(|m| m.uuid),
        Some(school.uuid)
    );
    assert!(matches!(
        service.register("DPS-EAST", "Duplicate"),
        Err(ServiceError::Repo(RepoError::Conflict(_)))
    ));

    service.set_active(school.uuid, false).unwrap();
    assert!(service.list(false).unwrap().is_empty());
    assert_eq!(service.list(true).unwrap().len(), 1);

    let admin = Principal::member(school.uuid, Role::Admin);
    let scoped = MerchantService::new(
        SqliteMerchantRepository::try_new(&conn, context(&admin)).unwrap(),
        admin,
    );
    assert!(matches!(
        scoped.register("OTHER", "Other School"),
        Err(ServiceError::Forbidden(_))
    ));
    assert_eq!(scoped.get(school.uuid).unwrap().name, "DPS East");
}

fn seed_merchant(conn: &Connection, code: &str) -> MerchantId {
    let repo = SqliteMerchantRepository::try_new(
        conn,
        TenantContext::new(TenantScope::Global, ScopePolicy { debug: true }),
    )
    .unwrap();
    repo.create_merchant(&Merchant::new(code, "Test School"))
        .unwrap()
        .uuid
}

fn context(principal: &Principal) -> TenantContext {
    TenantContext::for_principal(principal, ScopePolicy { debug: true }).unwrap()
}

fn student_service(
    conn: &Connection,
    merchant_id: MerchantId,
    role: Role,
) -> StudentService<SqliteStudentRepository<'_>> {
    let principal = Principal::member(merchant_id, role);
    let repo = SqliteStudentRepository::try_new(conn, context(&principal)).unwrap();
    StudentService::new(repo, principal)
}
