//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: ApplicationConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub github: GitHubOAuthConfig,
    pub logging: LoggingConfig,
}

/// Application metadata
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Display name (default: "RefactorIQ")
    pub name: String,
    /// Reported by /health
    pub version: String,
    /// "development" or "production"
    pub environment: String,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
    /// Frontend base URL; OAuth callbacks redirect to `{frontend_url}/dashboard`
    pub frontend_url: String,
    /// Origins allowed to make credentialed cross-origin requests
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Session and credential configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret (32+ bytes)
    pub secret_key: String,
    /// JWT algorithm, HMAC family only (default: HS256)
    pub algorithm: String,
    /// Session token lifetime in minutes (default: 30)
    pub access_token_expire_minutes: i64,
    /// Session cookie Max-Age in seconds (default: 30 days)
    pub cookie_max_age_seconds: i64,
    /// Base64-encoded 32-byte AES-256-GCM key for GitHub tokens at rest
    pub encryption_key: String,
    #[serde(default)]
    pub password_hash: PasswordHashConfig,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Requested OAuth scope (default: "repo")
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    /// REST API base, e.g. "https://api.github.com"
    pub api_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub fn default_filter(&self) -> String {
        format!("refactoriq={},tower_http=debug", self.level)
    }
}

const MIN_SECRET_KEY_BYTES: usize = 32;
const SUPPORTED_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (REFACTORIQ__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("app.name", "RefactorIQ")?
            .set_default("app.version", env!("CARGO_PKG_VERSION"))?
            .set_default("app.environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.frontend_url", "http://localhost:3000")?
            .set_default("server.cors_origins", vec!["http://localhost:3000"])?
            .set_default("database.path", "data/refactoriq.db")?
            .set_default("auth.algorithm", "HS256")?
            .set_default("auth.access_token_expire_minutes", 30)?
            .set_default("auth.cookie_max_age_seconds", 30 * 24 * 60 * 60)?
            .set_default("github.scope", "repo")?
            .set_default(
                "github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("github.api_url", "https://api.github.com")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("REFACTORIQ")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.auth.secret_key.len() < MIN_SECRET_KEY_BYTES {
            return Err(AppError::Config(format!(
                "auth.secret_key must be at least {} bytes",
                MIN_SECRET_KEY_BYTES
            )));
        }

        if !SUPPORTED_ALGORITHMS.contains(&self.auth.algorithm.as_str()) {
            return Err(AppError::Config(format!(
                "auth.algorithm must be one of {}",
                SUPPORTED_ALGORITHMS.join(", ")
            )));
        }

        if self.auth.access_token_expire_minutes <= 0 {
            return Err(AppError::Config(
                "auth.access_token_expire_minutes must be greater than 0".to_string(),
            ));
        }

        if self.auth.cookie_max_age_seconds <= 0 {
            return Err(AppError::Config(
                "auth.cookie_max_age_seconds must be greater than 0".to_string(),
            ));
        }

        crate::auth::credentials::TokenCipher::from_base64_key(&self.auth.encryption_key)
            .map_err(|_| {
                AppError::Config(
                    "auth.encryption_key must be base64 encoding of 32 bytes".to_string(),
                )
            })?;

        // credentialed CORS needs an explicit origin list
        if self.server.cors_origins.iter().any(|origin| origin.trim() == "*") {
            return Err(AppError::Config(
                "server.cors_origins must list explicit origins, not '*'".to_string(),
            ));
        }

        url::Url::parse(&self.server.frontend_url).map_err(|e| {
            AppError::Config(format!("server.frontend_url is not a valid URL: {e}"))
        })?;

        if self.github.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "github.client_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::Engine as _;

    pub(crate) fn valid_config() -> AppConfig {
        AppConfig {
            app: ApplicationConfig {
                name: "RefactorIQ".to_string(),
                version: "0.1.0".to_string(),
                environment: "development".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                frontend_url: "http://localhost:3000".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/refactoriq-test.db"),
            },
            auth: AuthConfig {
                secret_key: "x".repeat(32),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 30,
                cookie_max_age_seconds: 30 * 24 * 60 * 60,
                encryption_key: base64::engine::general_purpose::STANDARD.encode([7_u8; 32]),
                password_hash: PasswordHashConfig {
                    memory_kib: 1024,
                    iterations: 1,
                    parallelism: 1,
                },
            },
            github: GitHubOAuthConfig {
                client_id: "github-client-id".to_string(),
                client_secret: "github-client-secret".to_string(),
                redirect_uri: "http://localhost:8000/api/v1/auth/github/callback".to_string(),
                scope: "repo".to_string(),
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                api_url: "https://api.github.com".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_default_shape() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_secret_key() {
        let mut config = valid_config();
        config.auth.secret_key = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("auth.secret_key")
        ));
    }

    #[test]
    fn validate_rejects_asymmetric_algorithm() {
        let mut config = valid_config();
        config.auth.algorithm = "RS256".to_string();

        let error = config.validate().expect_err("RS256 needs a key pair");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("auth.algorithm")
        ));
    }

    #[test]
    fn validate_rejects_wrong_length_encryption_key() {
        let mut config = valid_config();
        config.auth.encryption_key = base64::engine::general_purpose::STANDARD.encode([1_u8; 16]);

        let error = config.validate().expect_err("16-byte key must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("auth.encryption_key")
        ));
    }

    #[test]
    fn validate_rejects_wildcard_cors_origin() {
        let mut config = valid_config();
        config.server.cors_origins = vec!["http://localhost:3000".to_string(), "*".to_string()];

        let error = config.validate().expect_err("wildcard origin must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("server.cors_origins")
        ));
    }

    #[test]
    fn default_filter_uses_configured_level() {
        let mut config = valid_config();
        config.logging.level = "debug".to_string();

        assert_eq!(
            config.logging.default_filter(),
            "refactoriq=debug,tower_http=debug"
        );
    }

    #[test]
    fn validate_rejects_non_positive_token_lifetime() {
        let mut config = valid_config();
        config.auth.access_token_expire_minutes = 0;
        assert!(config.validate().is_err());
    }
}
