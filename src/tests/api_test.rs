//! HTTP router tests for the token service API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::api;
use crate::auth::{AuthService, TokenService, UserDirectory};
use crate::config::{ApiConfig, AuthConfig};

fn test_router() -> (Router, Arc<AuthService>) {
    let auth_config = AuthConfig {
        access_secret: "api-test-access-secret-32-characters".to_string(),
        refresh_secret: "api-test-refresh-secret-32-character".to_string(),
        access_ttl_seconds: 900,
        refresh_ttl_seconds: 604_800,
    };
    let api_config = ApiConfig {
        port: 0,
        cors_enabled: false,
        cors_origins: Vec::new(),
    };

    let directory = UserDirectory::seeded().unwrap();
    let auth = Arc::new(AuthService::new(directory, TokenService::new(&auth_config)));
    (api::router(auth.clone(), &api_config), auth)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = builder
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, username: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        Some(json!({ "username": username, "password": "password123" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn login_returns_tokens_and_the_public_user() {
    let (app, auth) = test_router();

    let body = login(&app, "telecom_admin").await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["username"], "telecom_admin");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"]["passwordHash"].is_null());
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["expiresIn"], 900);

    let refresh = body["refreshToken"].as_str().unwrap();
    assert!(auth.refresh_store().contains(refresh).await);
}

#[tokio::test]
async fn login_with_bad_credentials_is_401() {
    let (app, _auth) = test_router();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({ "username": "intruder", "password": "password123" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let (app, _auth) = test_router();
    let body = login(&app, "telecom_admin").await;
    let old_refresh = body["refreshToken"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &app,
        "POST",
        "/api/auth/refresh",
        Some(json!({ "refreshToken": old_refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["accessToken"].is_string());
    assert_ne!(rotated["refreshToken"], Value::String(old_refresh.clone()));

    // The consumed token cannot be redeemed again.
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/refresh",
        Some(json!({ "refreshToken": old_refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_refresh_token() {
    let (app, _auth) = test_router();
    let body = login(&app, "telecom_admin").await;
    let refresh = body["refreshToken"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/logout",
            Some(json!({ "refreshToken": refresh })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logout successful");
    }

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/refresh",
        Some(json!({ "refreshToken": refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validate_reports_validity_and_claims() {
    let (app, _auth) = test_router();
    let body = login(&app, "network_engineer").await;
    let access = body["accessToken"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/validate",
        Some(json!({ "token": access })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["username"], "network_engineer");
    assert_eq!(body["user"]["role"], "engineer");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/validate",
        Some(json!({ "token": "garbage" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["valid"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn profile_requires_a_bearer_token() {
    let (app, _auth) = test_router();

    let (status, _) = send(&app, "GET", "/api/user/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let body = login(&app, "telecom_admin").await;
    let access = body["accessToken"].as_str().unwrap();

    let (status, body) = send(&app, "GET", "/api/user/profile", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "telecom_admin");
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
async fn network_stats_are_role_gated() {
    let (app, _auth) = test_router();

    let body = login(&app, "network_engineer").await;
    let engineer_token = body["accessToken"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "GET",
        "/api/network/stats",
        None,
        Some(&engineer_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["networkStats"]["totalCalls"].is_u64());
    assert!(body["networkStats"]["avgLatency"].is_string());
    assert_eq!(body["user"]["role"], "engineer");

    let body = login(&app, "support_user").await;
    let support_token = body["accessToken"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "GET",
        "/api/network/stats",
        None,
        Some(&support_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _auth) = test_router();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
