use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::server::AppState;
use crate::auth::tokens::extract_bearer_token;
use crate::auth::{AccessClaims, PublicUser, TokenPair};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Wrapper turning an [`AuthError`] into the `{ "error": … }` response body
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Pull the bearer token out of the `Authorization` header
fn bearer_from_headers(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AuthError::TokenInvalid("Missing Authorization header".to_string()))?;
    extract_bearer_token(value)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = state.auth.login(&request.username, &request.password).await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: outcome.user,
        tokens: outcome.tokens,
    }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> Json<serde_json::Value> {
    state.auth.logout(&request.refresh_token).await;
    Json(json!({ "message": "Logout successful" }))
}

/// POST /api/auth/validate
///
/// Unlike the other routes, failures here keep the `{valid: false}` body
/// shape the callers expect.
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Response {
    match state.auth.validate(&request.token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(json!({ "valid": true, "user": claims_user(&claims) })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "valid": false, "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// GET /api/user/profile (Bearer auth)
pub async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_from_headers(&headers)?;
    let user = state.auth.profile(token)?;
    Ok(Json(json!({ "user": user })))
}

/// GET /api/network/stats (Bearer auth, role-gated)
pub async fn network_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_from_headers(&headers)?;
    let (stats, user) = state.auth.network_stats(token)?;
    Ok(Json(json!({ "networkStats": stats, "user": user })))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

fn claims_user(claims: &AccessClaims) -> serde_json::Value {
    json!({
        "id": claims.sub,
        "username": claims.username,
        "email": claims.email,
        "role": claims.role,
    })
}
