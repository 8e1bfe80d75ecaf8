use crate::error::app_error::AppError;
use rocket::figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_API_BASE_PATH: &str = "/api";
pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub identity: IdentityConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

/// Where identity tokens are checked and what they must assert.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IdentityConfig {
    /// OAuth client id the token audience must match.
    pub client_id: String,
    /// Google `client_secret.json`; used when `client_id` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_path: Option<String>,
    pub issuer: String,
    pub tokeninfo_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub ttl_days: i64,
    pub cookie_secure: bool,
    /// Let a future identity-token expiry replace the fixed TTL at issue time.
    /// Off unless explicitly enabled.
    pub honor_token_expiry: bool,
    pub background_task_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/userauth".to_string(),
            max_connections: 16,
            min_connections: 2,
            acquire_timeout: 5,
            run_migrations: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: false,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret_path: None,
            issuer: GOOGLE_ISSUER.to_string(),
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            cookie_secure: false,
            honor_token_expiry: false,
            background_task_timeout_secs: 30,
        }
    }
}

#[derive(Deserialize)]
struct ClientSecretFile {
    web: ClientSecretWeb,
}

#[derive(Deserialize)]
struct ClientSecretWeb {
    client_id: String,
}

impl IdentityConfig {
    /// The audience tokens must carry, from `client_id` or the client secret file.
    pub fn resolve_client_id(&self) -> Result<String, AppError> {
        if !self.client_id.trim().is_empty() {
            return Ok(self.client_id.trim().to_string());
        }

        match &self.client_secret_path {
            Some(path) => read_client_id(Path::new(path)),
            None => Err(AppError::configuration("identity.client_id or identity.client_secret_path must be set")),
        }
    }
}

fn read_client_id(path: &Path) -> Result<String, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::configuration(format!("unable to read {}: {}", path.display(), e)))?;
    parse_client_id(&raw).map_err(|e| AppError::configuration(format!("unable to parse {}: {}", path.display(), e)))
}

fn parse_client_id(raw: &str) -> Result<String, serde_json::Error> {
    let file: ClientSecretFile = serde_json::from_str(raw)?;
    Ok(file.web.client_id)
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.ttl_days.max(1))
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. SessionGate.toml (if present)
    /// 3. Environment variables prefixed with SESSION_GATE_, sections split on `__`
    ///    (e.g. SESSION_GATE_SESSION__TTL_DAYS=7)
    /// 4. DATABASE_URL
    pub fn load() -> Result<Self, figment::Error> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("SessionGate.toml").nested())
            .merge(Env::prefixed("SESSION_GATE_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()));

        figment.extract()
    }
}
