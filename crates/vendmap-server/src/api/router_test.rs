use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;
use vendmap_core::{Building, BuildingDirectory, VendingMachineRecord};

const SECRET: &str = "router-test-secret-0123456789abcdef";
const BOUNDARY: &str = "vendmap-test-boundary";

fn buildings() -> BuildingDirectory {
    BuildingDirectory::new(vec![
        Building {
            name: "SW1".to_string(),
            lat: 49.2503,
            lng: -123.0016,
        },
        Building {
            name: "SW3".to_string(),
            lat: 49.2497,
            lng: -123.0020,
        },
        Building {
            name: "NE1".to_string(),
            lat: 49.2540,
            lng: -122.9990,
        },
    ])
    .expect("valid buildings")
}

fn state_with(pool: sqlx::PgPool, image_dir: &std::path::Path) -> AppState {
    AppState {
        pool,
        sessions: SessionKeys::new(SECRET, 604_800),
        images: ImageStore::new(image_dir, "http://localhost:3001", 1024 * 1024),
        buildings: Arc::new(buildings()),
        map_api_key: Some("maps-key-123".to_string()),
    }
}

/// Router whose pool never connects; only for routes that fail or answer
/// before touching the database.
fn offline_app(image_dir: &std::path::Path) -> Router {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy("postgres://vendmap@127.0.0.1:1/unused")
        .expect("lazy pool");
    build_app(
        state_with(pool, image_dir),
        default_rate_limit_state(),
        &["http://localhost:5173".to_string()],
    )
}

fn app_for(pool: sqlx::PgPool, image_dir: &std::path::Path) -> Router {
    build_app(
        state_with(pool, image_dir),
        default_rate_limit_state(),
        &["http://localhost:5173".to_string()],
    )
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}

fn session_cookie(response: &Response) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("ascii cookie");
    raw.split(';').next().expect("cookie pair").to_string()
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/vending-machine")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).expect("request")
}

// -------------------------------------------------------------------------
// Offline routes
// -------------------------------------------------------------------------

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn map_key_is_public() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = offline_app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/map-key")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let json = json_body(response).await;
    assert_eq!(json["key"], "maps-key-123");
}

#[tokio::test]
async fn building_search_returns_prefix_suggestions_and_exact_match() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = offline_app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/buildings?q=sw1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let names: Vec<&str> = json["suggestions"]
        .as_array()
        .expect("suggestions")
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, vec!["SW1"]);
    assert_eq!(json["match"]["name"], "SW1");
}

#[tokio::test]
async fn create_without_session_is_unauthorized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let body = multipart_body(&[("lat", "49.25")], None);
    let response = offline_app(dir.path())
        .oneshot(multipart_request(None, body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"]["message"], "Unauthorized, user not logged in");
}

#[tokio::test]
async fn invalid_token_is_rejected_even_on_public_routes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = offline_app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/map-key")
                .header(header::COOKIE, "auth=forged.token.value")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "unauthorized");
    assert_eq!(json["error"]["message"], "Invalid or expired token");
}

#[tokio::test]
async fn me_echoes_claims_for_a_bearer_token() {
    let dir = tempfile::tempdir().expect("tempdir");
    let token = SessionKeys::new(SECRET, 60)
        .issue(7, "bob@example.com", "bob")
        .expect("issue");

    let response = offline_app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], 7);
    assert_eq!(json["email"], "bob@example.com");
    assert_eq!(json["username"], "bob");
}

#[tokio::test]
async fn invalid_machine_id_is_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = offline_app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/vending-machine/abc")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["message"], "Invalid ID");
}

#[tokio::test]
async fn empty_patch_is_a_validation_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let token = SessionKeys::new(SECRET, 60)
        .issue(1, "a@b.c", "a")
        .expect("issue");
    let mut request = json_request("PATCH", "/api/vending-machine/1", &serde_json::json!({}));
    request.headers_mut().insert(
        header::COOKIE,
        format!("auth={token}").parse().expect("header value"),
    );

    let response = offline_app(dir.path())
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_insert_removes_the_uploaded_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let token = SessionKeys::new(SECRET, 60)
        .issue(1, "a@b.c", "a")
        .expect("issue");
    let body = multipart_body(
        &[
            ("lat", "49.25"),
            ("lon", "-123.0"),
            ("location", "SW1"),
            ("desc", "Snacks"),
            ("items", "[]"),
        ],
        Some(("snack.png", &b"orphan-candidate"[..])),
    );

    let response = offline_app(dir.path())
        .oneshot(multipart_request(Some(&format!("auth={token}")), body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let leftover = std::fs::read_dir(dir.path()).expect("image dir").count();
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn register_without_password_reports_missing_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = offline_app(dir.path())
        .oneshot(json_request(
            "POST",
            "/api/register",
            &serde_json::json!({ "email": "a@b.c" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["message"], "Missing fields");
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = offline_app(dir.path())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/logout")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .expect("ascii");
    assert!(cookie.contains("Max-Age=0"));
}

// -------------------------------------------------------------------------
// Database-backed flows
// -------------------------------------------------------------------------

async fn register_and_login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/register",
            &serde_json::json!({ "email": email, "password": "correct horse" }),
        ))
        .await
        .expect("register response");
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .expect("ascii")
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=604800"));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            &serde_json::json!({ "email": email, "password": "correct horse" }),
        ))
        .await
        .expect("login response");
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Login successful");
    cookie
}

#[sqlx::test(migrations = "../../migrations")]
async fn login_distinguishes_unknown_user_and_wrong_password(pool: sqlx::PgPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app_for(pool, dir.path());
    register_and_login(&app, "carol@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            &serde_json::json!({ "email": "nobody@example.com", "password": "x" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["message"], "User not found");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            &serde_json::json!({ "email": "carol@example.com", "password": "wrong" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["message"], "Invalid password");
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_registration_is_a_conflict(pool: sqlx::PgPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app_for(pool, dir.path());
    register_and_login(&app, "dave@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/register",
            &serde_json::json!({ "email": "DAVE@example.com", "password": "pw" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_edit_and_fetch_machine(pool: sqlx::PgPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app_for(pool, dir.path());
    let cookie = register_and_login(&app, "erin@example.com").await;

    let body = multipart_body(
        &[
            ("lat", "49.250123"),
            ("lon", "-123.001234"),
            ("location", "SW1"),
            ("desc", "Lobby snacks"),
            ("items", r#"[{"name":"Cola","available":true}]"#),
        ],
        Some(("snack.png", &b"fake-png-bytes"[..])),
    );
    let response = app
        .clone()
        .oneshot(multipart_request(Some(&cookie), body))
        .await
        .expect("create response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: VendingMachineRecord =
        serde_json::from_value(json_body(response).await).expect("record");
    assert!((created.lat - 49.250_123).abs() < 1e-9);
    assert!(created.available);
    let image_url = created.photo_url().expect("image url");
    assert!(image_url.starts_with("http://localhost:3001/images/"));
    assert!(image_url.ends_with(".png"));

    let response = app
        .clone()
        .oneshot({
            let mut req = json_request(
                "PATCH",
                &format!("/api/vending-machine/{}", created.id),
                &serde_json::json!({
                    "items": [{ "name": "Water", "available": false }],
                    "available": false
                }),
            );
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().expect("cookie header"));
            req
        })
        .await
        .expect("patch response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/vending-machine/{}", created.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("get response");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: VendingMachineRecord =
        serde_json::from_value(json_body(response).await).expect("record");
    assert!(!fetched.available);
    let items = fetched.parsed_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Water");
    assert!(!items[0].available);
    assert_eq!(fetched.created_at, created.created_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_rejects_missing_fields(pool: sqlx::PgPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app_for(pool, dir.path());
    let cookie = register_and_login(&app, "frank@example.com").await;

    let body = multipart_body(&[("lat", "49.25"), ("lon", "-123.0")], None);
    let response = app
        .oneshot(multipart_request(Some(&cookie), body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"]["message"],
        "Missing required fields"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn missing_machine_is_not_found(pool: sqlx::PgPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = app_for(pool, dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/vending-machine/999999")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_is_public_and_ordered(pool: sqlx::PgPool) {
    for (lat, location) in [("49.1", "A"), ("49.2", "B")] {
        sqlx::query(
            "INSERT INTO vending_machines (lat, lon, location, description, items) \
             VALUES ($1::numeric, -123.0, $2, 'seed', '[]')",
        )
        .bind(lat)
        .bind(location)
        .execute(&pool)
        .await
        .expect("seed machine");
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let response = app_for(pool, dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/vending-machine")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let records: Vec<VendingMachineRecord> =
        serde_json::from_value(json_body(response).await).expect("records");
    let locations: Vec<&str> = records.iter().map(|r| r.location.as_str()).collect();
    assert_eq!(locations, vec!["A", "B"]);
}
