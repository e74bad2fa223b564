//! Unit tests for token issuance and validation.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

use crate::auth::tokens::{
    extract_bearer_token, AccessClaims, TokenKind, TokenService,
};
use crate::auth::users::{Role, User};
use crate::config::AuthConfig;
use crate::error::AuthError;

fn test_config() -> AuthConfig {
    AuthConfig {
        access_secret: "test-access-secret-at-least-32-characters".to_string(),
        refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
        access_ttl_seconds: 900,
        refresh_ttl_seconds: 604_800,
    }
}

fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        username: "telecom_admin".to_string(),
        email: "admin@telecom.example".to_string(),
        password_hash: String::new(),
        role: Role::Admin,
    }
}

#[test]
fn issued_access_token_validates_with_matching_claims() {
    let service = TokenService::new(&test_config());
    let user = test_user();

    let pair = service.issue_pair(&user).unwrap();
    assert_eq!(pair.expires_in, 900);

    let claims = service.validate_access(&pair.access_token).unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.username, "telecom_admin");
    assert_eq!(claims.email, "admin@telecom.example");
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.token_type, TokenKind::Access);
    assert!(claims.exp > claims.iat);
}

#[test]
fn expired_access_token_reports_token_expired() {
    let config = test_config();
    let service = TokenService::new(&config);
    let user = test_user();

    // Encode claims whose expiry is well in the past, with the same secret
    // the service validates against.
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
        iat: now - 7200,
        exp: now - 3600,
        token_type: TokenKind::Access,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .unwrap();

    let result = service.validate_access(&token);
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

#[test]
fn garbage_token_reports_token_invalid() {
    let service = TokenService::new(&test_config());
    let result = service.validate_access("not-a-jwt");
    assert!(matches!(result, Err(AuthError::TokenInvalid(_))));
}

#[test]
fn token_signed_with_wrong_secret_is_invalid() {
    let service = TokenService::new(&test_config());

    let mut other = test_config();
    other.access_secret = "a-completely-different-signing-secret!!".to_string();
    let other_service = TokenService::new(&other);

    let pair = other_service.issue_pair(&test_user()).unwrap();
    let result = service.validate_access(&pair.access_token);
    assert!(matches!(result, Err(AuthError::TokenInvalid(_))));
}

#[test]
fn refresh_token_is_not_accepted_as_access_token() {
    let service = TokenService::new(&test_config());
    let pair = service.issue_pair(&test_user()).unwrap();

    // Different signing secret, so the signature check already rejects it.
    let result = service.validate_access(&pair.refresh_token);
    assert!(matches!(result, Err(AuthError::TokenInvalid(_))));
}

#[test]
fn access_token_is_not_accepted_as_refresh_token() {
    let service = TokenService::new(&test_config());
    let pair = service.issue_pair(&test_user()).unwrap();

    let result = service.decode_refresh(&pair.access_token);
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
}

#[test]
fn refresh_token_round_trips() {
    let service = TokenService::new(&test_config());
    let user = test_user();
    let pair = service.issue_pair(&user).unwrap();

    let claims = service.decode_refresh(&pair.refresh_token).unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.token_type, TokenKind::Refresh);
}

#[test]
fn bearer_prefix_extraction() {
    assert_eq!(extract_bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
    assert!(extract_bearer_token("abc.def.ghi").is_err());
    assert!(extract_bearer_token("bearer abc").is_err());
}
