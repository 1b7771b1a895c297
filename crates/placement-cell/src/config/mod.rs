use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_TOKEN_MIN_LENGTH: usize = 8;
/// Longest base-62 rendering of a `u64`; padding beyond this only wastes URL space.
const MAX_TOKEN_MIN_LENGTH: usize = 32;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    pub identifiers: IdentifierConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database_path = env::var("APP_DATABASE_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let session_salt = env::var("APP_SESSION_SALT")
            .unwrap_or_else(|_| "placement-session".to_string());
        let dummy_session_salt = env::var("APP_DUMMY_SESSION_SALT")
            .unwrap_or_else(|_| "placement-dummy-session".to_string());
        if environment == AppEnvironment::Production
            && (env::var("APP_SESSION_SALT").is_err()
                || env::var("APP_DUMMY_SESSION_SALT").is_err())
        {
            return Err(ConfigError::MissingSalt);
        }
        if session_salt == dummy_session_salt {
            return Err(ConfigError::SharedSalt);
        }

        let token_min_length = match env::var("APP_TOKEN_MIN_LENGTH") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|length| (1..=MAX_TOKEN_MIN_LENGTH).contains(length))
                .ok_or(ConfigError::InvalidTokenLength)?,
            Err(_) => DEFAULT_TOKEN_MIN_LENGTH,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            store: StoreConfig { database_path },
            identifiers: IdentifierConfig {
                session_salt,
                dummy_session_salt,
                token_min_length,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Persistence backend. Without a database path the service keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub database_path: Option<PathBuf>,
}

/// Salts and padding for the opaque session tokens shown in URLs.
#[derive(Clone)]
pub struct IdentifierConfig {
    pub session_salt: String,
    pub dummy_session_salt: String,
    pub token_min_length: usize,
}

impl fmt::Debug for IdentifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierConfig")
            .field("session_salt", &"<redacted>")
            .field("dummy_session_salt", &"<redacted>")
            .field("token_min_length", &self.token_min_length)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTokenLength,
    MissingSalt,
    SharedSalt,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTokenLength => write!(
                f,
                "APP_TOKEN_MIN_LENGTH must be between 1 and {MAX_TOKEN_MIN_LENGTH}"
            ),
            ConfigError::MissingSalt => write!(
                f,
                "APP_SESSION_SALT and APP_DUMMY_SESSION_SALT must be set in production"
            ),
            ConfigError::SharedSalt => write!(
                f,
                "APP_SESSION_SALT and APP_DUMMY_SESSION_SALT must differ"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTokenLength
            | ConfigError::MissingSalt
            | ConfigError::SharedSalt => None,
        }
    }
}
