use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use ulid::Ulid;

use deskspace::engine::OperatingHours;
use deskspace::http::{router, AppState, Claims, JwtVerifier};
use deskspace::model::Role;
use deskspace::service::Service;
use deskspace::tenant::TenantManager;

const SECRET: &str = "test-secret";

// ── Test infrastructure ──────────────────────────────────────

fn test_app() -> Router {
    let dir = std::env::temp_dir().join(format!("deskspace_http_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let tenants = Arc::new(TenantManager::open(dir, 1000).unwrap());
    let state = Arc::new(AppState {
        service: Service::new(tenants, OperatingHours::new(9, 18).unwrap()),
        verifier: JwtVerifier::new(SECRET),
    });
    router(state)
}

fn token_for(user: &Value) -> String {
    let claims = Claims {
        sub: user["userId"].as_str().unwrap().parse().unwrap(),
        role: serde_json::from_value::<Role>(user["role"].clone()).unwrap(),
        company: user["companyId"].as_str().unwrap().parse().unwrap(),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn signup_admin(app: &Router, company: &str, cert: &str, email: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/users/signup/admin",
        None,
        Some(json!({"companyName": company, "certification": cert, "email": email, "username": "boss"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["role"], "ADMIN");
    token_for(&body["data"])
}

async fn signup_user(app: &Router, cert: &str, email: &str, username: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/users/signup/user",
        None,
        Some(json!({"certification": cert, "email": email, "username": username})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["role"], "USER");
    token_for(&body["data"])
}

/// Creates a space and one meeting room in it; returns the room id.
async fn meeting_room(app: &Router, token: &str, company: &str) -> String {
    let (status, space) = call(
        app,
        Method::POST,
        &format!("/spaces/{company}"),
        Some(token),
        Some(json!({"name": "Main"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{space}");
    let space_id = space["data"]["spaceId"].as_str().unwrap();
    let (status, mr) = call(
        app,
        Method::POST,
        &format!("/mr/{company}/{space_id}"),
        Some(token),
        Some(json!({"name": "Blue", "x": "1", "y": "2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{mr}");
    assert_eq!(mr["data"]["kind"], "MEETING_ROOM");
    mr["data"]["locationId"].as_str().unwrap().to_string()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["data"]["companies"], 0);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = test_app();
    let (status, body) = call(&app, Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["statusCode"], 401);
    assert!(body["data"].is_null());

    let (status, _) = call(&app, Method::GET, "/users/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_then_me_and_certification_match() {
    let app = test_app();
    let admin = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;
    let ann = signup_user(&app, "ACME-01", "ann@acme.io", "ann").await;

    let (status, me) = call(&app, Method::GET, "/users/me", Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["username"], "ann");
    assert_eq!(me["data"]["companyName"], "Acme");
    assert!(me["data"]["locationId"].is_null());

    let (status, found) = call(
        &app,
        Method::POST,
        "/users/signup/match",
        None,
        Some(json!({"certification": "ACME-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["data"]["companyName"], "Acme");

    let (status, _) = call(
        &app,
        Method::POST,
        "/users/signup/admin",
        None,
        Some(json!({"companyName": "Acme", "certification": "OTHER", "email": "x@y.io", "username": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, users) = call(&app, Method::GET, "/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["data"].as_array().unwrap().len(), 2);
    let (status, _) = call(&app, Method::GET, "/admin/users", Some(&ann), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn floor_and_space_crud() {
    let app = test_app();
    let admin = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;

    let (status, floor) = call(&app, Method::POST, "/floors/Acme", Some(&admin), Some(json!({"name": "Ground"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let floor_id = floor["data"]["floorId"].as_str().unwrap().to_string();

    let (status, space) = call(
        &app,
        Method::POST,
        "/spaces/Acme",
        Some(&admin),
        Some(json!({"name": "Open plan", "floorId": floor_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(space["data"]["floorName"], "Ground");
    let space_id = space["data"]["spaceId"].as_str().unwrap().to_string();

    let (status, detail) = call(&app, Method::GET, &format!("/floors/Acme/{floor_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["data"]["spaces"][0]["spaceId"], space_id.as_str());

    let (status, renamed) = call(
        &app,
        Method::PATCH,
        &format!("/spaces/Acme/{space_id}"),
        Some(&admin),
        Some(json!({"name": "Quiet zone", "floorId": floor_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["data"]["name"], "Quiet zone");

    let (status, gone) = call(&app, Method::DELETE, &format!("/floors/Acme/{floor_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gone["data"]["floorId"], floor_id.as_str());
    assert_eq!(gone["data"]["spacesDetached"], 1);
    let (status, space) = call(&app, Method::GET, &format!("/spaces/Acme/{space_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(space["data"]["floorId"].is_null());

    let (status, deleted) = call(&app, Method::DELETE, &format!("/spaces/Acme/{space_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["reservationsRemoved"], 0);
    let (status, _) = call(&app, Method::GET, &format!("/spaces/Acme/{space_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_timetable_and_conflict() {
    let app = test_app();
    let admin = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;
    let ann = signup_user(&app, "ACME-01", "ann@acme.io", "ann").await;
    let bo = signup_user(&app, "ACME-01", "bo@acme.io", "bo").await;
    let mr = meeting_room(&app, &admin, "Acme").await;
    let uri = format!("/reservations/Acme/{mr}");

    let (status, booked) = call(
        &app,
        Method::POST,
        &uri,
        Some(&ann),
        Some(json!({"start": "2024-03-05T10:00", "end": "2024-03-05T11:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{booked}");
    assert_eq!(booked["data"]["mrName"], "Blue");
    assert_eq!(booked["data"]["start"], "2024-03-05T10:00");
    let reservation_id = booked["data"]["reservationId"].as_str().unwrap().to_string();

    let (status, clash) = call(
        &app,
        Method::POST,
        &uri,
        Some(&bo),
        Some(json!({"start": "2024-03-05T10:30", "end": "2024-03-05T11:30"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(clash["statusCode"], 409);

    let (status, slots) = call(
        &app,
        Method::POST,
        &uri,
        Some(&bo),
        Some(json!({"starts": ["2024-03-05T13:00", "2024-03-05T14:00"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{slots}");
    assert_eq!(slots["data"].as_array().unwrap().len(), 2);

    let (status, table) = call(&app, Method::GET, &format!("{uri}?date=2024-03-05"), Some(&bo), None).await;
    assert_eq!(status, StatusCode::OK, "{table}");
    let busy: Vec<bool> = table["data"]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["isCheckOut"].as_bool().unwrap())
        .collect();
    assert_eq!(busy, vec![false, true, false, false, true, true, false, false, false]);
    assert_eq!(table["data"]["slots"][0]["start"], "09:00");

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/reservations/Acme/{reservation_id}"),
        Some(&bo),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, moved) = call(
        &app,
        Method::PATCH,
        &format!("/reservations/Acme/{reservation_id}"),
        Some(&ann),
        Some(json!({"start": "2024-03-05T16:00", "end": "2024-03-05T17:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["data"]["start"], "2024-03-05T16:00");

    let (status, mine) = call(&app, Method::GET, "/reservations/Acme?mine=true", Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);
    let (_, all) = call(&app, Method::GET, "/reservations/Acme", Some(&ann), None).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn other_company_is_forbidden() {
    let app = test_app();
    let acme = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;
    let globex = signup_admin(&app, "Globex", "GLOBEX-01", "boss@globex.io").await;
    meeting_room(&app, &acme, "Acme").await;

    let (status, body) = call(&app, Method::GET, "/mr/Acme", Some(&globex), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["statusCode"], 403);
    let (status, rooms) = call(&app, Method::GET, "/mr/Acme", Some(&acme), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rooms["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_input_is_bad_request() {
    let app = test_app();
    let admin = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/floors/Acme")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, "/floors/Acme/not-a-ulid", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/floors/Acme", Some(&admin), Some(json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seating_a_user_at_a_box() {
    let app = test_app();
    let admin = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;
    let ann = signup_user(&app, "ACME-01", "ann@acme.io", "ann").await;
    let (_, space) = call(&app, Method::POST, "/spaces/Acme", Some(&admin), Some(json!({"name": "Open"}))).await;
    let space_id = space["data"]["spaceId"].as_str().unwrap();
    let (status, desk) = call(
        &app,
        Method::POST,
        &format!("/boxes/Acme/{space_id}"),
        Some(&admin),
        Some(json!({"name": "D1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let desk_id = desk["data"]["locationId"].as_str().unwrap().to_string();

    let (status, seated) = call(&app, Method::PATCH, &format!("/locations/Acme/{desk_id}"), Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seated["data"]["occupants"][0]["username"], "ann");

    let (status, _) = call(&app, Method::PATCH, &format!("/locations/Acme/{desk_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A box id is not a meeting room.
    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/mr/Acme/{desk_id}"),
        Some(&admin),
        Some(json!({"name": "Nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn multibox_routes() {
    let app = test_app();
    let admin = signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;
    let (_, space) = call(&app, Method::POST, "/spaces/Acme", Some(&admin), Some(json!({"name": "Open"}))).await;
    let space_id = space["data"]["spaceId"].as_str().unwrap();

    let (status, cluster) = call(
        &app,
        Method::POST,
        &format!("/multibox/Acme/{space_id}"),
        Some(&admin),
        Some(json!({"name": "Hot desks"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{cluster}");
    assert_eq!(cluster["data"]["kind"], "MULTI_BOX");
    let cluster_id = cluster["data"]["locationId"].as_str().unwrap().to_string();

    let (status, renamed) = call(
        &app,
        Method::PATCH,
        &format!("/multibox/Acme/{cluster_id}"),
        Some(&admin),
        Some(json!({"name": "Hub"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["data"]["name"], "Hub");

    let (status, _) = call(&app, Method::DELETE, &format!("/multibox/Acme/{cluster_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::DELETE, &format!("/multiboxes/Acme/{cluster_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn personal_schedules() {
    let app = test_app();
    signup_admin(&app, "Acme", "ACME-01", "boss@acme.io").await;
    let ann = signup_user(&app, "ACME-01", "ann@acme.io", "ann").await;
    let bo = signup_user(&app, "ACME-01", "bo@acme.io", "bo").await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/schedules",
        Some(&ann),
        Some(json!({"title": "Dentist", "start": "2024-03-05T10:00", "end": "2024-03-05T11:30"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["data"]["comment"], "");
    let id = created["data"]["scheduleId"].as_str().unwrap().to_string();

    let (status, table) = call(&app, Method::GET, "/schedules/timetable?date=2024-03-05", Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK, "{table}");
    let busy: Vec<bool> = table["data"]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["isCheckOut"].as_bool().unwrap())
        .collect();
    assert_eq!(busy[..4], [false, true, true, false]);
    assert_eq!(table["data"]["schedules"][0]["title"], "Dentist");

    // Someone else's schedule does not exist for them.
    let (status, _) = call(&app, Method::GET, &format!("/schedules/{id}"), Some(&bo), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, theirs) = call(&app, Method::GET, "/schedules", Some(&bo), None).await;
    assert!(theirs["data"].as_array().unwrap().is_empty());

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &format!("/schedules/{id}"),
        Some(&ann),
        Some(json!({"title": "Dentist", "comment": "moved", "start": "2024-03-06T10:00", "end": "2024-03-06T11:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["start"], "2024-03-06T10:00");

    let (status, _) = call(&app, Method::DELETE, &format!("/schedules/{id}"), Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, mine) = call(&app, Method::GET, "/schedules", Some(&ann), None).await;
    assert!(mine["data"].as_array().unwrap().is_empty());
}
