use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers;
use crate::auth::AuthService;
use crate::config::{ApiConfig, Config};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

/// Build the token service router
pub fn router(auth: Arc<AuthService>, api: &ApiConfig) -> Router {
    let state = AppState { auth };

    let mut router = Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/validate", post(handlers::validate))
        .route("/api/user/profile", get(handlers::profile))
        .route("/api/network/stats", get(handlers::network_stats))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if api.cors_enabled {
        let origin = if api.cors_origins.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                api.cors_origins
                    .iter()
                    .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
            )
        };
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// Serve the token service API until the process stops
pub async fn start_server(config: Config, auth: Arc<AuthService>) -> Result<()> {
    let app = router(auth, &config.api);

    let addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "token service API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
