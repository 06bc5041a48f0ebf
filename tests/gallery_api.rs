//! Integration tests for uploads, listings, deletes and the booked-dates ledger.

mod common;

use axum::http::{StatusCode, header};
use common::{
    MultipartBody, TestApp, TestAppBuilder, admin_basic, body_json, dir_names, get, json_request,
    login, test_app, tiny_png, with_header,
};
use serde::Deserialize;
use sonic_rs::JsonValueTrait;

#[derive(Deserialize, Debug)]
struct Entry {
    url: String,
    name: String,
    thumb: Option<String>,
    medium: Option<String>,
}

#[derive(Deserialize)]
struct Uploaded {
    uploaded: Vec<Entry>,
}

#[derive(Deserialize)]
struct Dates {
    dates: Vec<String>,
}

async fn upload(app: &TestApp, uri: &str, body: MultipartBody) -> axum::http::Response<axum::body::Body> {
    app.send(with_header(
        body.into_request(uri),
        header::AUTHORIZATION,
        &admin_basic(),
    ))
    .await
}

async fn uploaded(response: axum::http::Response<axum::body::Body>) -> Vec<Entry> {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    sonic_rs::from_slice::<Uploaded>(&bytes).unwrap().uploaded
}

async fn listing(app: &TestApp, uri: &str) -> Vec<Entry> {
    let response = app.send(get(uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    sonic_rs::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_requires_admin() {
    let app = test_app();
    let body = MultipartBody::new().file("images", "a.png", "image/png", &tiny_png());

    let response = app.send(body.into_request("/api/upload")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"].as_str(),
        Some("Authentication required")
    );
    assert!(dir_names(&app.uploads_dir()).is_empty());
}

#[tokio::test]
async fn upload_with_basic_auth_then_list() {
    let app = test_app();
    let body = MultipartBody::new()
        .file("images", "photo one.png", "image/png", &tiny_png())
        .file("images", "b.png", "image/png", &tiny_png());

    let response = upload(&app, "/api/upload", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = uploaded(response).await;
    assert_eq!(entries.len(), 2);
    assert!(entries[0].name.ends_with("-photo_one.png"));
    assert_eq!(entries[0].url, format!("/uploads/{}", entries[0].name));

    let listed = listing(&app, "/api/images").await;
    let mut names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
    names.sort();
    let mut expected: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    expected.sort();
    assert_eq!(names, expected);

    assert!(dir_names(app.tmp_dir()).is_empty());
}

#[tokio::test]
async fn upload_with_a_session_cookie() {
    let app = test_app();
    let cookie = login(&app).await;
    let body = MultipartBody::new().file("images", "c.png", "image/png", &tiny_png());

    let response = app
        .send(with_header(body.into_request("/api/upload"), header::COOKIE, &cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn upload_without_files_is_rejected() {
    let app = test_app();
    let body = MultipartBody::new().text("target", "trip");

    let response = upload(&app, "/api/upload", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"].as_str(), Some("No files uploaded"));
}

#[tokio::test]
async fn a_storage_failure_skips_only_that_file() {
    let app = TestAppBuilder::new().failing_storage("broken").build();
    let body = MultipartBody::new()
        .file("images", "a.png", "image/png", &tiny_png())
        .file("images", "broken.png", "image/png", &tiny_png())
        .file("images", "c.png", "image/png", &tiny_png());

    let response = upload(&app, "/api/upload", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = uploaded(response).await;
    assert_eq!(entries.len(), 2);
    assert!(entries[0].name.ends_with("-a.png"));
    assert!(entries[1].name.ends_with("-c.png"));
    assert_eq!(dir_names(&app.uploads_dir()).len(), 2);
    assert!(dir_names(app.tmp_dir()).is_empty());
}

#[tokio::test]
async fn oversized_files_are_rejected() {
    let app = TestAppBuilder::new().var("UPLOAD_MAX_FILE_BYTES", "16").build();
    let body = MultipartBody::new().file("images", "big.bin", "application/octet-stream", &[7u8; 64]);

    let response = upload(&app, "/api/upload", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"].as_str(),
        Some("File too large: big.bin")
    );
    assert!(dir_names(app.tmp_dir()).is_empty());
    assert!(dir_names(&app.uploads_dir()).is_empty());
}

#[tokio::test]
async fn more_than_a_hundred_files_are_rejected() {
    let app = test_app();
    let body = (0..101).fold(MultipartBody::new(), |body, i| {
        body.file("images", &format!("f{i}.txt"), "text/plain", b"x")
    });

    let response = upload(&app, "/api/upload", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"].as_str(),
        Some("Too many files (max 100)")
    );
    assert!(dir_names(app.tmp_dir()).is_empty());
}

#[tokio::test]
async fn traversal_in_file_names_stays_inside_the_upload_root() {
    let app = test_app();
    let body = MultipartBody::new().file("images", "../../etc/passwd", "text/plain", b"root:x:0:0");

    let response = upload(&app, "/api/upload", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = uploaded(response).await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].name.contains('/'));

    let stored = dir_names(&app.uploads_dir());
    assert_eq!(stored, vec![entries[0].name.clone()]);
    assert!(app.uploads_dir().join(&entries[0].name).is_file());
    assert!(!app.path("etc").exists());
    assert!(!app.path("public/etc").exists());
}

#[tokio::test]
async fn targets_are_sanitized_into_a_subfolder() {
    let app = test_app();
    let body = MultipartBody::new().file("images", "a.png", "image/png", &tiny_png());

    let response = upload(&app, "/api/upload?target=../trip", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let entries = uploaded(response).await;
    assert!(entries[0].url.starts_with("/uploads/trip/"));

    assert_eq!(listing(&app, "/api/images?target=trip").await.len(), 1);
    assert!(listing(&app, "/api/images").await.is_empty());
}

#[tokio::test]
async fn target_field_applies_to_following_files() {
    let app = test_app();
    let body = MultipartBody::new()
        .text("target", "album")
        .file("images", "a.png", "image/png", &tiny_png());

    let entries = uploaded(upload(&app, "/api/upload", body).await).await;
    assert!(entries[0].url.starts_with("/uploads/album/"));
}

#[tokio::test]
async fn thumbnails_are_generated_and_hidden_from_listings() {
    let app = TestAppBuilder::new().var("THUMBNAILS", "true").build();
    let body = MultipartBody::new().file("images", "pic.png", "image/png", &tiny_png());

    let entries = uploaded(upload(&app, "/api/upload", body).await).await;
    let entry = &entries[0];
    let stem = entry.name.trim_end_matches(".png");
    assert_eq!(entry.thumb.as_deref(), Some(format!("/uploads/{}-thumb.jpg", stem).as_str()));
    assert_eq!(entry.medium.as_deref(), Some(format!("/uploads/{}-med.jpg", stem).as_str()));
    assert_eq!(dir_names(&app.uploads_dir()).len(), 3);

    let listed = listing(&app, "/api/images").await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, entry.name);
    assert!(listed[0].thumb.is_some());
}

// ---------------------------------------------------------------------------
// Deletes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_missing_file_returns_404() {
    let app = test_app();
    let response = app
        .send(with_header(
            json_request("DELETE", "/api/images/nope.png", ""),
            header::AUTHORIZATION,
            &admin_basic(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_the_file() {
    let app = test_app();
    let body = MultipartBody::new().file("images", "gone.png", "image/png", &tiny_png());
    let entries = uploaded(upload(&app, "/api/upload", body).await).await;
    let name = entries[0].name.clone();

    let response = app
        .send(with_header(
            json_request("DELETE", &format!("/api/images/{}", name), ""),
            header::AUTHORIZATION,
            &admin_basic(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"].as_str(), Some(name.as_str()));
    assert!(listing(&app, "/api/images").await.is_empty());
}

#[tokio::test]
async fn delete_requires_admin_and_a_valid_name() {
    let app = test_app();

    let response = app
        .send(json_request("DELETE", "/api/images/a.png", ""))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(with_header(
            json_request("DELETE", "/api/images/bad%20name.png", ""),
            header::AUTHORIZATION,
            &admin_basic(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Booked dates
// ---------------------------------------------------------------------------

async fn dates(app: &TestApp) -> Vec<String> {
    let response = app.send(get("/api/booked-dates")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    sonic_rs::from_slice::<Dates>(&bytes).unwrap().dates
}

async fn post_dates(app: &TestApp, body: &str) -> axum::http::Response<axum::body::Body> {
    app.send(with_header(
        json_request("POST", "/api/booked-dates", body),
        header::AUTHORIZATION,
        &admin_basic(),
    ))
    .await
}

#[tokio::test]
async fn booked_dates_start_empty() {
    let app = test_app();
    assert!(dates(&app).await.is_empty());
}

#[tokio::test]
async fn add_deduplicates_and_remove_empties() {
    let app = test_app();

    let response = post_dates(
        &app,
        r#"{"action":"add","dates":["2025-06-01","2025-06-01"]}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dates(&app).await, vec!["2025-06-01"]);

    let response = post_dates(&app, r#"{"action":"add","dates":["2025-06-01","2025-06-02"]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dates(&app).await, vec!["2025-06-01", "2025-06-02"]);

    let response = post_dates(&app, r#"{"action":"remove","dates":["2025-06-01","2025-06-02"]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(dates(&app).await.is_empty());
}

#[tokio::test]
async fn action_defaults_to_set() {
    let app = test_app();
    post_dates(&app, r#"{"action":"add","dates":["2025-01-01"]}"#).await;

    let response = post_dates(&app, r#"{"dates":["2025-02-02"]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dates(&app).await, vec!["2025-02-02"]);
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let app = test_app();
    let response = post_dates(&app, r#"{"action":"toggle","dates":[]}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"].as_str(), Some("Invalid action"));
}

#[tokio::test]
async fn non_string_dates_are_stored_as_text() {
    let app = test_app();

    let response = post_dates(&app, r#"{"action":"add","dates":["2025-01-01",20250102]}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dates(&app).await, vec!["2025-01-01", "20250102"]);
}

#[tokio::test]
async fn malformed_date_requests_get_json_errors() {
    let app = test_app();

    let response = post_dates(&app, "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().is_some());

    let form = axum::http::Request::post("/api/booked-dates")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::AUTHORIZATION, admin_basic())
        .body(axum::body::Body::from("2025-01-01"))
        .unwrap();
    let response = app.send(form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"].as_str(),
        Some("Expected a JSON body")
    );
    assert!(dates(&app).await.is_empty());
}

#[tokio::test]
async fn mutating_dates_requires_admin() {
    let app = test_app();
    let response = app
        .send(json_request("POST", "/api/booked-dates", r#"{"dates":["2025-01-01"]}"#))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(dates(&app).await.is_empty());
}
