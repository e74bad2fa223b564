use serde::{Deserialize, Serialize};

// Default configuration values
const DEFAULT_API_PORT: u16 = 3002;
const DEFAULT_ACCESS_TTL_SECONDS: u64 = 900;
const DEFAULT_REFRESH_TTL_SECONDS: u64 = 604_800;
const DEFAULT_STATUS_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_REFRESH_MARGIN_SECONDS: u64 = 60;
const DEFAULT_BUS_CAPACITY: usize = 100;

/// Main configuration struct for the auth relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Token service HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Token issuance configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Relay protocol configuration
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Token service HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port to bind the API server to
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Whether to enable CORS
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,
    /// Allowed origins for CORS (empty means all)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Token issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens (default is randomly generated)
    #[serde(default = "generate_random_secret")]
    pub access_secret: String,
    /// HMAC secret for signing refresh tokens (default is randomly generated)
    #[serde(default = "generate_random_secret")]
    pub refresh_secret: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl_seconds: u64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_seconds: u64,
}

/// Relay protocol configuration shared by authorities and requesters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Origins accepted on the message bus
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// How long a requester waits for the initial status answer before
    /// failing closed, in milliseconds
    #[serde(default = "default_status_timeout")]
    pub status_timeout_ms: u64,
    /// Deadline for a single proxied API call, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// The authority refreshes its credential when it is within this many
    /// seconds of expiry
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_seconds: u64,
    /// Broadcast channel capacity of the message bus
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

// Default functions
fn default_api_port() -> u16 {
    std::env::var("AUTHRELAY_API_PORT")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_API_PORT)
}

fn default_cors_enabled() -> bool {
    std::env::var("AUTHRELAY_CORS_ENABLED")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(true)
}

fn default_access_ttl() -> u64 {
    std::env::var("AUTHRELAY_ACCESS_TTL_SECONDS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_ACCESS_TTL_SECONDS)
}

fn default_refresh_ttl() -> u64 {
    std::env::var("AUTHRELAY_REFRESH_TTL_SECONDS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_REFRESH_TTL_SECONDS)
}

fn default_status_timeout() -> u64 {
    std::env::var("AUTHRELAY_STATUS_TIMEOUT_MS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_STATUS_TIMEOUT_MS)
}

fn default_request_timeout() -> u64 {
    std::env::var("AUTHRELAY_REQUEST_TIMEOUT_MS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS)
}

fn default_refresh_margin() -> u64 {
    std::env::var("AUTHRELAY_REFRESH_MARGIN_SECONDS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_REFRESH_MARGIN_SECONDS)
}

fn default_bus_capacity() -> usize {
    std::env::var("AUTHRELAY_BUS_CAPACITY")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_BUS_CAPACITY)
}

fn default_allowed_origins() -> Vec<String> {
    match std::env::var("AUTHRELAY_ALLOWED_ORIGINS") {
        Ok(val) => val
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        Err(_) => vec![
            "http://localhost:3000".to_string(),
            "http://localhost:3001".to_string(),
            "http://localhost:4200".to_string(),
        ],
    }
}

fn generate_random_secret() -> String {
    use rand::Rng;
    let secret: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(48)
        .map(char::from)
        .collect();

    secret
}

fn access_secret_from_env() -> String {
    std::env::var("AUTHRELAY_ACCESS_SECRET").unwrap_or_else(|_| generate_random_secret())
}

fn refresh_secret_from_env() -> String {
    std::env::var("AUTHRELAY_REFRESH_SECRET").unwrap_or_else(|_| generate_random_secret())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            cors_enabled: default_cors_enabled(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: access_secret_from_env(),
            refresh_secret: refresh_secret_from_env(),
            access_ttl_seconds: default_access_ttl(),
            refresh_ttl_seconds: default_refresh_ttl(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            status_timeout_ms: default_status_timeout(),
            request_timeout_ms: default_request_timeout(),
            refresh_margin_seconds: default_refresh_margin(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

/// Load the application configuration from the environment
pub fn load_config() -> Config {
    Config::default()
}
