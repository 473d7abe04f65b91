mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_returns_token_and_user() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "  Asha@Example.com ", "password": "correct-horse", "name": "Asha"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].as_str().is_some());
    assert!(body["data"]["expiresIn"].as_u64().unwrap() > 0);
    assert_eq!(body["data"]["user"]["email"], "asha@example.com");
    assert!(body["data"]["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = TestApp::new();
    app.register("dup@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "DUP@example.com", "password": "another-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn short_password_fails_validation() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "x@example.com", "password": "short"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = TestApp::new();
    app.register("login@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "login@example.com", "password": "correct-horse"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].as_str().is_some());

    let (status, wrong_password) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "login@example.com", "password": "wrong-horse"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown_user) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "correct-horse"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["message"], unknown_user["message"]);
}

#[tokio::test]
async fn login_accepts_padded_mixed_case_email() {
    let app = TestApp::new();
    app.register("padded@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "  Padded@EXAMPLE.com\t", "password": "correct-horse"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user"]["email"], "padded@example.com");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new();

    let (status, _) = app.request(Method::GET, "/api/user/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/user/profile", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_writes_store_nothing() {
    let app = TestApp::new();
    let token = app.register("untouched@example.com").await;
    let upload = json!({"files": [common::csv_file("statement.csv", b"a,b\n1,2\n")]});

    for auth in [None, Some("not-a-jwt")] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/tax-inputs",
                auth,
                Some(json!({"annualIncome": 900000})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .request(Method::POST, "/api/documents/upload", auth, Some(upload.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .request(Method::POST, "/api/chat", auth, Some(json!({"message": "hello"})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = app.get("/api/tax-inputs", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/api/documents", &token).await;
    assert_eq!(body["data"]["pagination"]["total"], 0);
    let (_, body) = app.get("/api/chat/history", &token).await;
    assert_eq!(body["data"]["totalMessages"], 0);
    assert!(app.gateway.chat_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn profile_can_be_read_and_updated() {
    let app = TestApp::new();
    let token = app.register("profile@example.com").await;

    let (status, body) = app.get("/api/user/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Test User");

    let (status, body) = app
        .put("/api/user/profile", &token, json!({"name": "Renamed", "phone": "9876543210"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["phone"], "9876543210");
    assert_eq!(body["data"]["email"], "profile@example.com");
}

#[tokio::test]
async fn public_endpoints_answer_without_a_token() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "TaxWise API");

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}
