use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use super::*;
use crate::model::{LocationKind, Ms, Role};

fn test_data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("deskspace_test_service").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn service(name: &str) -> Service {
    let tenants = TenantManager::open(test_data_dir(name), 1000).unwrap();
    Service::new(Arc::new(tenants), OperatingHours::new(9, 18).unwrap())
}

fn caller_of(user: &UserResponse) -> Caller {
    Caller {
        user_id: user.user_id,
        role: user.role,
        company_id: user.company_id,
    }
}

async fn signup(svc: &Service, company: &str, cert: &str, email: &str) -> Caller {
    let admin = svc
        .signup_admin(SignupAdmin {
            company_name: company.into(),
            certification: cert.into(),
            email: email.into(),
            username: "admin".into(),
        })
        .await
        .unwrap();
    caller_of(&admin)
}

async fn join(svc: &Service, cert: &str, email: &str) -> Caller {
    let user = svc
        .signup_user(SignupUser {
            certification: cert.into(),
            email: email.into(),
            username: email.split('@').next().unwrap().into(),
        })
        .await
        .unwrap();
    caller_of(&user)
}

async fn room(svc: &Service, admin: &Caller, company: &str) -> Ulid {
    let space = svc
        .create_space(admin, company, SpaceInput { name: "Main".into(), floor_id: None })
        .await
        .unwrap();
    svc.create_location(
        admin,
        company,
        space.space_id,
        LocationKind::MeetingRoom,
        LocationInput { name: "Blue".into(), x: "1".into(), y: "1".into() },
    )
    .await
    .unwrap()
    .location_id
}

fn at(raw: &str) -> Ms {
    time::parse_instant(raw).unwrap()
}

#[tokio::test]
async fn manager_of_other_company_gets_tenant_mismatch() {
    let svc = service("tenant_mismatch");
    let acme_admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let globex_admin = signup(&svc, "Globex", "G-1", "boss@globex.io").await;
    let mr = room(&svc, &acme_admin, "Acme").await;

    let err = svc
        .update_location(
            &globex_admin,
            "Acme",
            mr,
            LocationKind::MeetingRoom,
            LocationInput { name: "Mine".into(), x: String::new(), y: String::new() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TenantMismatch));
    assert!(matches!(svc.list_floors(&globex_admin, "Acme"), Err(EngineError::TenantMismatch)));
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let svc = service("unknown_company");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    assert!(matches!(
        svc.list_spaces(&admin, "Nope"),
        Err(EngineError::NotFound(Entity::Company, _))
    ));
}

#[tokio::test]
async fn users_read_but_do_not_mutate() {
    let svc = service("user_reads");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let ann = join(&svc, "A-1", "ann@acme.io").await;

    assert!(svc.list_spaces(&ann, "Acme").unwrap().is_empty());
    let err = svc
        .create_floor(&ann, "Acme", FloorInput { name: "1st".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied { required: Role::Manager, actual: Role::User }));

    svc.edit_user_role(&admin, ann.user_id, EditRole { role: Role::Manager })
        .await
        .unwrap();
    let promoted = Caller { role: Role::Manager, ..ann };
    svc.create_floor(&promoted, "Acme", FloorInput { name: "1st".into() })
        .await
        .unwrap();
}

#[tokio::test]
async fn admin_operations_are_admin_only() {
    let svc = service("admin_only");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let ann = join(&svc, "A-1", "ann@acme.io").await;

    assert_eq!(svc.list_users(&admin).unwrap().len(), 2);
    assert!(matches!(svc.list_users(&ann), Err(EngineError::PermissionDenied { .. })));
    let manager = Caller { role: Role::Manager, ..ann };
    assert!(matches!(svc.get_user(&manager, admin.user_id), Err(EngineError::PermissionDenied { .. })));

    let err = svc
        .edit_user_role(&admin, ann.user_id, EditRole { role: Role::Admin })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let err = svc
        .edit_user_role(&admin, admin.user_id, EditRole { role: Role::User })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn reservation_flow_and_ownership() {
    let svc = service("reservation_flow");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let ann = join(&svc, "A-1", "ann@acme.io").await;
    let bo = join(&svc, "A-1", "bo@acme.io").await;
    let mr = room(&svc, &admin, "Acme").await;

    let booked = svc
        .reserve(&ann, "Acme", mr, at("2024-03-05T10:00"), at("2024-03-05T11:30"))
        .await
        .unwrap();
    assert_eq!(booked.mr_name, "Blue");
    assert_eq!(booked.username, "ann");

    let table = svc
        .room_timetable(&bo, "Acme", mr, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        .await
        .unwrap();
    let busy: Vec<bool> = table.slots.iter().map(|s| s.is_check_out).collect();
    assert_eq!(busy, vec![false, true, true, false, false, false, false, false, false]);

    let clash = svc
        .reserve(&bo, "Acme", mr, at("2024-03-05T11:00"), at("2024-03-05T12:00"))
        .await
        .unwrap_err();
    assert!(matches!(clash, EngineError::Conflict(id) if id == booked.reservation_id));

    // Another user may not cancel; a manager may.
    let err = svc.cancel(&bo, "Acme", booked.reservation_id).await.unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied { .. }));
    svc.reschedule(
        &ann,
        "Acme",
        booked.reservation_id,
        RescheduleInput { start: at("2024-03-05T14:00"), end: at("2024-03-05T15:00") },
    )
    .await
    .unwrap();
    assert_eq!(svc.list_reservations(&ann, "Acme", true).await.unwrap().len(), 1);
    assert!(svc.list_reservations(&bo, "Acme", true).await.unwrap().is_empty());
    svc.cancel(&admin, "Acme", booked.reservation_id).await.unwrap();
    assert!(svc.list_reservations(&admin, "Acme", false).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_space_clears_its_reservations() {
    let svc = service("space_cascade");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let mr = room(&svc, &admin, "Acme").await;
    svc.reserve_slots(
        &admin,
        "Acme",
        mr,
        vec![at("2024-03-05T09:00"), at("2024-03-05T10:00")],
    )
    .await
    .unwrap();
    let space_id = svc.list_spaces(&admin, "Acme").unwrap()[0].space_id;

    let deleted = svc.delete_space(&admin, "Acme", space_id).await.unwrap();
    assert_eq!(deleted.reservations_removed, 2);
    assert!(svc.list_reservations(&admin, "Acme", false).await.unwrap().is_empty());
    assert!(matches!(
        svc.list_meeting_rooms(&admin, "Acme").await.map(|r| r.len()),
        Ok(0)
    ));
}

#[tokio::test]
async fn move_user_between_desks() {
    let svc = service("move_user");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let ann = join(&svc, "A-1", "ann@acme.io").await;
    let space = svc
        .create_space(&admin, "Acme", SpaceInput { name: "Open".into(), floor_id: None })
        .await
        .unwrap()
        .space_id;
    let desk = svc
        .create_location(
            &admin,
            "Acme",
            space,
            LocationKind::Box,
            LocationInput { name: "D1".into(), x: "0".into(), y: "0".into() },
        )
        .await
        .unwrap()
        .location_id;

    let seated = svc.move_user(&ann, "Acme", desk).await.unwrap();
    assert_eq!(seated.occupants.len(), 1);
    assert_eq!(svc.me(&ann).unwrap().location_id, Some(desk));
    assert!(matches!(svc.move_user(&admin, "Acme", desk).await, Err(EngineError::Conflict(_))));

    let detail = svc.get_space(&admin, "Acme", space).await.unwrap();
    assert_eq!(detail.boxes[0].occupants[0].username, "ann");
}

#[tokio::test]
async fn certification_lookup() {
    let svc = service("certification");
    signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    assert_eq!(svc.check_certification("A-1").unwrap().company_name, "Acme");
    assert!(matches!(svc.check_certification("Z"), Err(EngineError::NotFound(..))));
}

#[tokio::test]
async fn schedules_are_scoped_to_their_owner() {
    let svc = service("schedules");
    signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let ann = join(&svc, "A-1", "ann@acme.io").await;
    let bo = join(&svc, "A-1", "bo@acme.io").await;

    let standup = svc
        .create_schedule(
            &ann,
            ScheduleInput {
                title: "Standup".into(),
                comment: String::new(),
                start: at("2024-03-05T09:00"),
                end: at("2024-03-05T09:15"),
            },
        )
        .await
        .unwrap();
    assert_eq!(svc.list_schedules(&ann).unwrap(), vec![standup.clone()]);
    assert!(svc.list_schedules(&bo).unwrap().is_empty());
    assert!(matches!(
        svc.delete_schedule(&bo, standup.schedule_id).await,
        Err(EngineError::NotFound(Entity::Schedule, _))
    ));

    let day = svc
        .schedule_day(&ann, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        .unwrap();
    assert!(day.slots[0].is_check_out);
    assert!(!day.slots[1].is_check_out);
    assert_eq!(day.schedules, vec![standup.clone()]);

    svc.delete_schedule(&ann, standup.schedule_id).await.unwrap();
    assert!(svc.get_schedule(&ann, standup.schedule_id).is_err());
}

#[tokio::test]
async fn floor_delete_reports_detached_spaces() {
    let svc = service("floor_delete");
    let admin = signup(&svc, "Acme", "A-1", "boss@acme.io").await;
    let floor = svc
        .create_floor(&admin, "Acme", FloorInput { name: "1st".into() })
        .await
        .unwrap();
    for name in ["East", "West"] {
        svc.create_space(&admin, "Acme", SpaceInput { name: name.into(), floor_id: Some(floor.floor_id) })
            .await
            .unwrap();
    }
    let gone = svc.delete_floor(&admin, "Acme", floor.floor_id).await.unwrap();
    assert_eq!(gone.spaces_detached, 2);
}
