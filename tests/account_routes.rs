mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use coursehub::{
    accounts::MemoryAccountStore, app::build_app, config::AppConfig, courses::MemoryCourseStore,
    state::AppState, storage::StorageClient,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{empty_request, json_request, multipart_request, TestApp};

/// Storage backend that refuses every write.
struct RejectingStorage;

#[async_trait::async_trait]
impl StorageClient for RejectingStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        anyhow::bail!("bucket unavailable for {}", key)
    }

    async fn delete_object(&self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("http://storage.invalid/{}", key)
    }
}

fn avatar_register(email: &str) -> axum::http::Request<axum::body::Body> {
    multipart_request(
        Method::POST,
        "/api/v1/user/register",
        None,
        &[
            ("fullName", "Grace Hopper"),
            ("email", email),
            ("password", "password123"),
        ],
        &[("avatar", "me.jpg", "image/jpeg", b"jpeg")],
    )
}

async fn register(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/api/v1/user/register",
            None,
            json!({"fullName": "Grace Hopper", "email": email, "password": password}),
        ))
        .await;
    (status, body)
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/api/v1/user/login",
            None,
            json!({"email": email, "password": password}),
        ))
        .await;
    (status, body)
}

#[tokio::test]
async fn health_is_ok() {
    let app = TestApp::new();
    let res = app.send(empty_request(Method::GET, "/api/v1/health", None)).await;
    assert_eq!(res.0, StatusCode::OK);
}

#[tokio::test]
async fn register_returns_public_user_and_token() {
    let app = TestApp::new();
    let (status, body) = register(&app, " Grace@Navy.MIL ", "cobol-forever").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["email"], "grace@navy.mil");
    assert_eq!(body["user"]["fullName"], "grace hopper");
    assert_eq!(body["user"]["role"], "USER");
    assert!(body["user"].get("password").is_none());

    let identity = app.state.keys.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(identity.id.to_string(), body["user"]["id"].as_str().unwrap());
    assert_eq!(body["expiresIn"], 15 * 60);
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let app = TestApp::new();
    register(&app, "dup@example.com", "password123").await;
    let (status, body) = register(&app, "DUP@example.com", "password123").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_key");
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn register_validation_names_the_field() {
    let app = TestApp::new();
    let (status, body) = register(&app, "short@example.com", "short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "password");

    let (status, body) = register(&app, "not-an-email", "password123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn register_with_avatar_upload() {
    let app = TestApp::new();
    let req = multipart_request(
        Method::POST,
        "/api/v1/user/register",
        None,
        &[
            ("fullName", "Grace Hopper"),
            ("email", "avatar@example.com"),
            ("password", "password123"),
        ],
        &[("avatar", "me.jpg", "image/jpeg", b"jpeg")],
    );
    let (status, _, body) = app.send(req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let key = body["user"]["avatar"]["public_id"].as_str().unwrap();
    assert!(key.starts_with("avatars/"));
    assert!(app.storage.contains(key));
}

#[tokio::test]
async fn failed_avatar_upload_keeps_no_account() {
    let state = AppState::from_parts(
        AppConfig::test_default(),
        Arc::new(MemoryAccountStore::default()),
        Arc::new(MemoryCourseStore::default()),
        Arc::new(RejectingStorage),
    )
    .unwrap();

    let res = build_app(state.clone())
        .oneshot(avatar_register("stuck@example.com"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(state
        .accounts
        .find_by_email_with_password("stuck@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_register_with_avatar_leaves_no_upload() {
    let app = TestApp::new();
    let (status, _) = register(&app, "taken@example.com", "password123").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = app.send(avatar_register("Taken@example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["field"], "email");
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn invalid_register_with_avatar_uploads_nothing() {
    let app = TestApp::new();
    let (status, _, body) = app.send(avatar_register("not-an-email")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "email");
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = TestApp::new();
    register(&app, "login@example.com", "password123").await;

    let (status, body) = login(&app, "LOGIN@example.com", "password123").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, body) = login(&app, "login@example.com", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "Invalid credentials");

    let (status, _) = login(&app, "nobody@example.com", "password123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_token() {
    let app = TestApp::new();
    let (_, body) = register(&app, "me@example.com", "password123").await;
    let token = body["token"].as_str().unwrap();

    let (status, _, _) = app.send(empty_request(Method::GET, "/api/v1/user/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, me) = app
        .send(empty_request(Method::GET, "/api/v1/user/me", Some(token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "me@example.com");
}

#[tokio::test]
async fn change_password_verifies_old_one() {
    let app = TestApp::new();
    let (_, body) = register(&app, "change@example.com", "password123").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _, _) = app
        .send(json_request(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&token),
            json!({"oldPassword": "not-the-password", "newPassword": "brand-new-pass"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app
        .send(json_request(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&token),
            json!({"oldPassword": "password123", "newPassword": "brand-new-pass"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(login(&app, "change@example.com", "password123").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "change@example.com", "brand-new-pass").await.0, StatusCode::OK);
}
