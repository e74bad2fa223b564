use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use authrelay::auth::{AuthService, TokenService, UserDirectory};
use authrelay::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(_) => None,
    };

    // Initialize the tracing subscriber for structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "authrelay=debug,tower_http=debug,warn".into()
            } else {
                "authrelay=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!(version = authrelay::VERSION, "authrelay token service starting");

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => info!("No .env file found, using environment variables"),
    }

    let config = config::load_config();

    let directory = UserDirectory::seeded()?;
    info!(users = directory.len(), "user directory seeded");

    let tokens = TokenService::new(&config.auth);
    let auth = Arc::new(AuthService::new(directory, tokens));

    authrelay::api::start_server(config, auth).await
}
