//! NomNom service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default login URL members are sent to when they have no session.
pub const DEFAULT_LOGIN_URL: &str = "/login/";

/// Default number of nominations a member may make per category.
pub const DEFAULT_NOMINATION_COUNT: u32 = 5;

/// Default object storage region.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Default lifetime of a packet download URL in seconds.
pub const DEFAULT_PACKET_URL_EXPIRY_SECONDS: u64 = 300;

/// Longest lifetime a presigned download URL may have (7 days).
pub const MAX_PACKET_URL_EXPIRY_SECONDS: u64 = 604_800;

/// Minimum session signing key length in bytes.
pub const MIN_SECRET_KEY_BYTES: usize = 32;

/// NomNom service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Database URL and session signing key are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: SecretString,

    /// HS256 key used to sign and verify member sessions.
    pub secret_key: SecretString,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Where members without a session are redirected.
    pub login_url: String,

    /// Whether the election list offers username/password login.
    pub allow_username_login: bool,

    /// Nominations allowed per category.
    pub nomination_count: u32,

    /// JWT clock skew tolerance in seconds for session validation.
    pub jwt_clock_skew_seconds: i64,

    /// Object storage region.
    pub s3_region: String,

    /// Custom endpoint for S3-compatible stores (MinIO, Ceph, ...).
    pub s3_endpoint_url: Option<String>,

    /// Use path-style bucket addressing.
    pub s3_force_path_style: bool,

    /// Lifetime of presigned packet download URLs in seconds.
    pub packet_url_expiry_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("login_url", &self.login_url)
            .field("allow_username_login", &self.allow_username_login)
            .field("nomination_count", &self.nomination_count)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint_url", &self.s3_endpoint_url)
            .field("s3_force_path_style", &self.s3_force_path_style)
            .field("packet_url_expiry_seconds", &self.packet_url_expiry_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid secret key configuration: {0}")]
    InvalidSecretKey(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid nomination count configuration: {0}")]
    InvalidNominationCount(String),

    #[error("Invalid packet URL expiry configuration: {0}")]
    InvalidPacketUrlExpiry(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBool(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let secret_key = vars
            .get("SECRET_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("SECRET_KEY".to_string()))?
            .clone();

        if secret_key.len() < MIN_SECRET_KEY_BYTES {
            return Err(ConfigError::InvalidSecretKey(format!(
                "SECRET_KEY must be at least {} bytes, got {}",
                MIN_SECRET_KEY_BYTES,
                secret_key.len()
            )));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let login_url = vars
            .get("LOGIN_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());

        let allow_username_login = parse_bool(vars, "NOMNOM_ALLOW_USERNAME_LOGIN", false)?;

        let nomination_count = if let Some(value_str) = vars.get("NOMNOM_HUGO_NOMINATION_COUNT")
        {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidNominationCount(format!(
                    "NOMNOM_HUGO_NOMINATION_COUNT must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidNominationCount(
                    "NOMNOM_HUGO_NOMINATION_COUNT must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_NOMINATION_COUNT
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let s3_region = vars
            .get("NOMNOM_S3_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_S3_REGION.to_string());

        let s3_endpoint_url = vars
            .get("NOMNOM_S3_ENDPOINT_URL")
            .filter(|v| !v.is_empty())
            .cloned();

        let s3_force_path_style = parse_bool(vars, "NOMNOM_S3_FORCE_PATH_STYLE", false)?;

        let packet_url_expiry_seconds =
            if let Some(value_str) = vars.get("NOMNOM_PACKET_URL_EXPIRY_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidPacketUrlExpiry(format!(
                        "NOMNOM_PACKET_URL_EXPIRY_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidPacketUrlExpiry(
                        "NOMNOM_PACKET_URL_EXPIRY_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_PACKET_URL_EXPIRY_SECONDS {
                    return Err(ConfigError::InvalidPacketUrlExpiry(format!(
                        "NOMNOM_PACKET_URL_EXPIRY_SECONDS must not exceed {} seconds, got {}",
                        MAX_PACKET_URL_EXPIRY_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_PACKET_URL_EXPIRY_SECONDS
            };

        Ok(Config {
            database_url: SecretString::from(database_url),
            secret_key: SecretString::from(secret_key),
            bind_address,
            login_url,
            allow_username_login,
            nomination_count,
            jwt_clock_skew_seconds,
            s3_region,
            s3_endpoint_url,
            s3_force_path_style,
            packet_url_expiry_seconds,
        })
    }

    /// The database URL, for pool construction only.
    pub fn database_url(&self) -> &str {
        self.database_url.expose_secret()
    }
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    match value_str.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool(format!(
            "{} must be true or false, got '{}'",
            name, value_str
        ))),
    }
}
