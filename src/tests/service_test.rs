//! Scenario tests for the auth service facade.

use crate::auth::users::Role;
use crate::auth::{AuthService, TokenService, UserDirectory};
use crate::config::AuthConfig;
use crate::error::AuthError;

fn test_config() -> AuthConfig {
    AuthConfig {
        access_secret: "service-test-access-secret-32-chars!".to_string(),
        refresh_secret: "service-test-refresh-secret-32-chars".to_string(),
        access_ttl_seconds: 900,
        refresh_ttl_seconds: 604_800,
    }
}

fn seeded_service() -> AuthService {
    let directory = UserDirectory::seeded().unwrap();
    AuthService::new(directory, TokenService::new(&test_config()))
}

#[tokio::test]
async fn login_issues_a_validating_pair_and_registers_the_refresh_token() {
    let service = seeded_service();

    let outcome = service.login("telecom_admin", "password123").await.unwrap();
    assert_eq!(outcome.user.username, "telecom_admin");
    assert_eq!(outcome.user.role, Role::Admin);

    let claims = service.validate(&outcome.tokens.access_token).unwrap();
    assert_eq!(claims.username, "telecom_admin");
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.sub, outcome.user.id.to_string());

    assert!(service.refresh_store().contains(&outcome.tokens.refresh_token).await);
}

#[tokio::test]
async fn login_accepts_email_as_the_login_name() {
    let service = seeded_service();
    let outcome = service
        .login("engineer@telecom.example", "password123")
        .await
        .unwrap();
    assert_eq!(outcome.user.username, "network_engineer");
}

#[tokio::test]
async fn login_with_unknown_user_or_wrong_password_fails() {
    let service = seeded_service();

    let result = service.login("nobody", "password123").await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    let result = service.login("telecom_admin", "hunter2").await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn refresh_rotates_and_invalidates_the_old_token() {
    let service = seeded_service();
    let outcome = service.login("telecom_admin", "password123").await.unwrap();
    let old_refresh = outcome.tokens.refresh_token.clone();

    let rotated = service.refresh(&old_refresh).await.unwrap();
    assert_ne!(rotated.refresh_token, old_refresh);
    assert!(service.refresh_store().contains(&rotated.refresh_token).await);

    // The old token was consumed by the rotation.
    let result = service.refresh(&old_refresh).await;
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));

    // The rotated token still works.
    service.refresh(&rotated.refresh_token).await.unwrap();
}

#[tokio::test]
async fn refresh_with_a_forged_token_fails() {
    let service = seeded_service();
    let result = service.refresh("not-a-refresh-token").await;
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
}

#[tokio::test]
async fn logout_revokes_the_refresh_token_idempotently() {
    let service = seeded_service();
    let outcome = service.login("telecom_admin", "password123").await.unwrap();
    let refresh = outcome.tokens.refresh_token;

    service.logout(&refresh).await;
    assert!(!service.refresh_store().contains(&refresh).await);

    // Logging out again is a no-op, and the token cannot be redeemed.
    service.logout(&refresh).await;
    let result = service.refresh(&refresh).await;
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
}

#[tokio::test]
async fn network_stats_are_gated_by_role() {
    let service = seeded_service();

    for (login, allowed) in [
        ("telecom_admin", true),
        ("network_engineer", true),
        ("support_user", false),
    ] {
        let outcome = service.login(login, "password123").await.unwrap();
        let result = service.network_stats(&outcome.tokens.access_token);
        if allowed {
            let (stats, user) = result.unwrap();
            assert_eq!(user.username, login);
            assert!(stats.total_calls > 0);
        } else {
            assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
        }
    }
}

#[tokio::test]
async fn profile_resolves_the_bearer_identity() {
    let service = seeded_service();
    let outcome = service.login("network_engineer", "password123").await.unwrap();

    let user = service.profile(&outcome.tokens.access_token).unwrap();
    assert_eq!(user.username, "network_engineer");
    assert_eq!(user.role, Role::Engineer);
}
