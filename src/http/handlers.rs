use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::response::{ApiError, ResponseMessage};
use super::AppState;
use crate::engine::EngineError;
use crate::guard::Caller;
use crate::model::LocationKind;
use crate::observability;
use crate::service::*;

type Reply<T> = Result<ResponseMessage<T>, ApiError>;
type Shared = State<Arc<AppState>>;

fn ok<T: serde::Serialize>(op: &'static str, started: Instant, message: &str, result: Result<T, EngineError>) -> Reply<T> {
    observability::record(op, started, &result);
    Ok(ResponseMessage::ok(message, result?))
}

fn created<T: serde::Serialize>(
    op: &'static str,
    started: Instant,
    message: &str,
    result: Result<T, EngineError>,
) -> Reply<T> {
    observability::record(op, started, &result);
    Ok(ResponseMessage::created(message, result?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub id: Ulid,
    pub reservations_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub companies: usize,
}

pub async fn health(State(state): Shared) -> ResponseMessage<Health> {
    ResponseMessage::ok("ok", Health { companies: state.service.tenants().len() })
}

// ── Users ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CertificationInput {
    pub certification: String,
}

pub async fn signup_admin(State(state): Shared, body: Result<Json<SignupAdmin>, JsonRejection>) -> Reply<UserResponse> {
    let Json(req) = body?;
    let started = Instant::now();
    created("signup_admin", started, "company registered", state.service.signup_admin(req).await)
}

pub async fn signup_user(State(state): Shared, body: Result<Json<SignupUser>, JsonRejection>) -> Reply<UserResponse> {
    let Json(req) = body?;
    let started = Instant::now();
    created("signup_user", started, "user registered", state.service.signup_user(req).await)
}

pub async fn signup_match(
    State(state): Shared,
    body: Result<Json<CertificationInput>, JsonRejection>,
) -> Reply<CertificationMatch> {
    let Json(req) = body?;
    let started = Instant::now();
    ok("check_certification", started, "certification matched", state.service.check_certification(&req.certification))
}

pub async fn me(State(state): Shared, caller: Caller) -> Reply<UserResponse> {
    ok("me", Instant::now(), "current user", state.service.me(&caller))
}

// ── Admin ────────────────────────────────────────────────

pub async fn list_users(State(state): Shared, caller: Caller) -> Reply<Vec<UserResponse>> {
    ok("list_users", Instant::now(), "users", state.service.list_users(&caller))
}

pub async fn get_user(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<Ulid>, PathRejection>,
) -> Reply<UserResponse> {
    let Path(user_id) = path?;
    ok("get_user", Instant::now(), "user", state.service.get_user(&caller, user_id))
}

pub async fn edit_user_role(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<Ulid>, PathRejection>,
    body: Result<Json<EditRole>, JsonRejection>,
) -> Reply<UserResponse> {
    let Path(user_id) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.edit_user_role(&caller, user_id, req).await;
    ok("edit_user_role", started, "role updated", result)
}

// ── Floors ───────────────────────────────────────────────

pub async fn list_floors(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> Reply<Vec<FloorResponse>> {
    let Path(company) = path?;
    ok("list_floors", Instant::now(), "floors", state.service.list_floors(&caller, &company))
}

pub async fn create_floor(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<FloorInput>, JsonRejection>,
) -> Reply<FloorResponse> {
    let Path(company) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.create_floor(&caller, &company, req).await;
    created("create_floor", started, "floor created", result)
}

pub async fn get_floor(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<FloorDetail> {
    let Path((company, floor_id)) = path?;
    ok("get_floor", Instant::now(), "floor", state.service.get_floor(&caller, &company, floor_id))
}

pub async fn rename_floor(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<FloorInput>, JsonRejection>,
) -> Reply<FloorResponse> {
    let Path((company, floor_id)) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.rename_floor(&caller, &company, floor_id, req).await;
    ok("rename_floor", started, "floor updated", result)
}

pub async fn delete_floor(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<FloorDeleted> {
    let Path((company, floor_id)) = path?;
    let started = Instant::now();
    let result = state.service.delete_floor(&caller, &company, floor_id).await;
    ok("delete_floor", started, "floor deleted", result)
}

// ── Spaces ───────────────────────────────────────────────

pub async fn list_spaces(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> Reply<Vec<SpaceResponse>> {
    let Path(company) = path?;
    ok("list_spaces", Instant::now(), "spaces", state.service.list_spaces(&caller, &company))
}

pub async fn create_space(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<SpaceInput>, JsonRejection>,
) -> Reply<SpaceResponse> {
    let Path(company) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.create_space(&caller, &company, req).await;
    created("create_space", started, "space created", result)
}

pub async fn get_space(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<SpaceDetail> {
    let Path((company, space_id)) = path?;
    let started = Instant::now();
    let result = state.service.get_space(&caller, &company, space_id).await;
    ok("get_space", started, "space", result)
}

pub async fn update_space(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<SpaceInput>, JsonRejection>,
) -> Reply<SpaceResponse> {
    let Path((company, space_id)) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.update_space(&caller, &company, space_id, req).await;
    ok("update_space", started, "space updated", result)
}

pub async fn delete_space(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<SpaceDeleted> {
    let Path((company, space_id)) = path?;
    let started = Instant::now();
    let result = state.service.delete_space(&caller, &company, space_id).await;
    ok("delete_space", started, "space deleted", result)
}

// ── Boxes, multiboxes, meeting rooms ─────────────────────

async fn create_location(
    kind: LocationKind,
    state: Arc<AppState>,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    let Path((company, space_id)) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state
        .service
        .create_location(&caller, &company, space_id, kind, req)
        .await;
    created("create_location", started, &format!("{} created", kind.label()), result)
}

async fn update_location(
    kind: LocationKind,
    state: Arc<AppState>,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    let Path((company, location_id)) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state
        .service
        .update_location(&caller, &company, location_id, kind, req)
        .await;
    ok("update_location", started, &format!("{} updated", kind.label()), result)
}

async fn delete_location(
    kind: LocationKind,
    state: Arc<AppState>,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<Deleted> {
    let Path((company, location_id)) = path?;
    let started = Instant::now();
    let result = state
        .service
        .delete_location(&caller, &company, location_id, kind)
        .await
        .map(|reservations_removed| Deleted { id: location_id, reservations_removed });
    ok("delete_location", started, &format!("{} deleted", kind.label()), result)
}

pub async fn create_box(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    create_location(LocationKind::Box, state, caller, path, body).await
}

pub async fn update_box(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    update_location(LocationKind::Box, state, caller, path, body).await
}

pub async fn delete_box(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<Deleted> {
    delete_location(LocationKind::Box, state, caller, path).await
}

pub async fn create_multibox(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    create_location(LocationKind::MultiBox, state, caller, path, body).await
}

pub async fn update_multibox(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    update_location(LocationKind::MultiBox, state, caller, path, body).await
}

pub async fn delete_multibox(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<Deleted> {
    delete_location(LocationKind::MultiBox, state, caller, path).await
}

pub async fn list_meeting_rooms(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> Reply<Vec<LocationResponse>> {
    let Path(company) = path?;
    let started = Instant::now();
    let result = state.service.list_meeting_rooms(&caller, &company).await;
    ok("list_meeting_rooms", started, "meeting rooms", result)
}

pub async fn create_meeting_room(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    create_location(LocationKind::MeetingRoom, state, caller, path, body).await
}

pub async fn update_meeting_room(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Reply<LocationResponse> {
    update_location(LocationKind::MeetingRoom, state, caller, path, body).await
}

pub async fn delete_meeting_room(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<Deleted> {
    delete_location(LocationKind::MeetingRoom, state, caller, path).await
}

pub async fn move_user(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<LocationResponse> {
    let Path((company, location_id)) = path?;
    let started = Instant::now();
    let result = state.service.move_user(&caller, &company, location_id).await;
    ok("move_user", started, "user moved", result)
}

// ── Reservations ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

pub async fn list_reservations(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Reply<Vec<ReservationResponse>> {
    let Path(company) = path?;
    let Query(q) = query?;
    let started = Instant::now();
    let result = state.service.list_reservations(&caller, &company, q.mine).await;
    ok("list_reservations", started, "reservations", result)
}

pub async fn room_timetable(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Reply<TimetableResponse> {
    let Path((company, mr_id)) = path?;
    let Query(q) = query?;
    let started = Instant::now();
    let result = state.service.room_timetable(&caller, &company, mr_id, q.date).await;
    ok("room_timetable", started, "timetable", result)
}

pub async fn reserve(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<ReserveInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path((company, mr_id)) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    match req {
        ReserveInput::Span { start, end } => {
            let result = state.service.reserve(&caller, &company, mr_id, start, end).await;
            created("reserve", started, "reservation confirmed", result).map(IntoResponse::into_response)
        }
        ReserveInput::Slots { starts } => {
            let result = state.service.reserve_slots(&caller, &company, mr_id, starts).await;
            created("reserve_slots", started, "reservations confirmed", result).map(IntoResponse::into_response)
        }
    }
}

pub async fn reschedule(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
    body: Result<Json<RescheduleInput>, JsonRejection>,
) -> Reply<ReservationResponse> {
    let Path((company, reservation_id)) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.reschedule(&caller, &company, reservation_id, req).await;
    ok("reschedule", started, "reservation rescheduled", result)
}

pub async fn cancel(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<(String, Ulid)>, PathRejection>,
) -> Reply<ReservationResponse> {
    let Path((company, reservation_id)) = path?;
    let started = Instant::now();
    let result = state.service.cancel(&caller, &company, reservation_id).await;
    ok("cancel", started, "reservation cancelled", result)
}

// ── Schedules ────────────────────────────────────────────

pub async fn list_schedules(State(state): Shared, caller: Caller) -> Reply<Vec<ScheduleResponse>> {
    ok("list_schedules", Instant::now(), "schedules", state.service.list_schedules(&caller))
}

pub async fn create_schedule(
    State(state): Shared,
    caller: Caller,
    body: Result<Json<ScheduleInput>, JsonRejection>,
) -> Reply<ScheduleResponse> {
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.create_schedule(&caller, req).await;
    created("create_schedule", started, "schedule created", result)
}

pub async fn schedule_timetable(
    State(state): Shared,
    caller: Caller,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Reply<ScheduleDayResponse> {
    let Query(q) = query?;
    ok("schedule_timetable", Instant::now(), "timetable", state.service.schedule_day(&caller, q.date))
}

pub async fn get_schedule(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<Ulid>, PathRejection>,
) -> Reply<ScheduleResponse> {
    let Path(schedule_id) = path?;
    ok("get_schedule", Instant::now(), "schedule", state.service.get_schedule(&caller, schedule_id))
}

pub async fn update_schedule(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<Ulid>, PathRejection>,
    body: Result<Json<ScheduleInput>, JsonRejection>,
) -> Reply<ScheduleResponse> {
    let Path(schedule_id) = path?;
    let Json(req) = body?;
    let started = Instant::now();
    let result = state.service.update_schedule(&caller, schedule_id, req).await;
    ok("update_schedule", started, "schedule updated", result)
}

pub async fn delete_schedule(
    State(state): Shared,
    caller: Caller,
    path: Result<Path<Ulid>, PathRejection>,
) -> Reply<ScheduleResponse> {
    let Path(schedule_id) = path?;
    let started = Instant::now();
    let result = state.service.delete_schedule(&caller, schedule_id).await;
    ok("delete_schedule", started, "schedule deleted", result)
}
