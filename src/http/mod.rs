//! REST surface over [`Service`]. Every body is wrapped in
//! [`ResponseMessage`]; every route but signup and health needs a bearer token.

mod auth;
mod handlers;
mod response;

pub use auth::{Claims, JwtVerifier};
pub use response::{ApiError, ResponseMessage};

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::service::Service;

pub struct AppState {
    pub service: Service,
    pub verifier: JwtVerifier,
}

pub fn router(state: Arc<AppState>) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(health))
        .route("/users/signup/admin", post(signup_admin))
        .route("/users/signup/user", post(signup_user))
        .route("/users/signup/match", post(signup_match))
        .route("/users/me", get(me))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", get(get_user).patch(edit_user_role))
        .route("/floors/:company", get(list_floors).post(create_floor))
        .route(
            "/floors/:company/:id",
            get(get_floor).patch(rename_floor).delete(delete_floor),
        )
        .route("/spaces/:company", get(list_spaces).post(create_space))
        .route(
            "/spaces/:company/:id",
            get(get_space).patch(update_space).delete(delete_space),
        )
        .route(
            "/boxes/:company/:id",
            post(create_box).patch(update_box).delete(delete_box),
        )
        .route(
            "/multibox/:company/:id",
            post(create_multibox).patch(update_multibox).delete(delete_multibox),
        )
        .route("/mr/:company", get(list_meeting_rooms))
        .route(
            "/mr/:company/:id",
            post(create_meeting_room)
                .patch(update_meeting_room)
                .delete(delete_meeting_room),
        )
        .route("/locations/:company/:id", patch(move_user))
        .route("/reservations/:company", get(list_reservations))
        .route(
            "/reservations/:company/:id",
            get(room_timetable).post(reserve).patch(reschedule).delete(cancel),
        )
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route("/schedules/timetable", get(schedule_timetable))
        .route(
            "/schedules/:id",
            get(get_schedule).patch(update_schedule).delete(delete_schedule),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
