use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthProvider;

pub const MIN_SESSION_SECRET_LEN: usize = 32;
pub const DEFAULT_TEST_USERNAME: &str = "demo";
/// One year
pub const MAX_SESSION_TTL_HOURS: i64 = 8760;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub session_secret: Secret,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
}

impl SecurityConfig {
    /// Session lifetime in hours, held to `1..=MAX_SESSION_TTL_HOURS`
    pub fn session_ttl_hours(&self) -> i64 {
        self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours())
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub provider: AuthProvider,
}

/// String that never shows up in Debug output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes>)", self.0.len())
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. `DATABASE_URL` and
    /// `SESSION_SECRET` are required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)?;

        config.database.url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let secret = lookup("SESSION_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        config.security.session_secret = Secret::new(secret);

        config.validate()?;
        Ok(config)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("DESK_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Some(v) = lookup("SESSION_TTL_HOURS") {
            self.security.session_ttl_hours = v.parse().unwrap_or(self.security.session_ttl_hours);
        }
        if let Some(v) = lookup("SECURITY_COOKIE_SECURE") {
            self.security.cookie_secure = v.parse().unwrap_or(self.security.cookie_secure);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth provider
        if let Some(v) = lookup("AUTH_PROVIDER") {
            self.auth.provider = match v.trim() {
                "real" | "" => AuthProvider::Real,
                "fixed-test-user" => AuthProvider::FixedTestUser {
                    username: lookup("DESK_TEST_USER").unwrap_or_else(|| DEFAULT_TEST_USERNAME.to_string()),
                },
                other => {
                    return Err(ConfigError::Invalid {
                        key: "AUTH_PROVIDER",
                        message: format!("expected 'real' or 'fixed-test-user', got '{}'", other),
                    })
                }
            };
        }

        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.session_secret.expose().len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "SESSION_SECRET",
                message: format!("must be at least {} bytes", MIN_SESSION_SECRET_LEN),
            });
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.security.session_ttl_hours) {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                message: format!("must be between 1 and {}", MAX_SESSION_TTL_HOURS),
            });
        }
        if self.is_production() && matches!(self.auth.provider, AuthProvider::FixedTestUser { .. }) {
            return Err(ConfigError::Invalid {
                key: "AUTH_PROVIDER",
                message: "fixed-test-user is not allowed in production".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Development defaults. Secrets and database URL are left empty.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                session_secret: Secret::default(),
                session_ttl_hours: 24,
                cookie_secure: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            auth: AuthConfig {
                provider: AuthProvider::Real,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                session_secret: Secret::default(),
                session_ttl_hours: 24,
                cookie_secure: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            auth: AuthConfig {
                provider: AuthProvider::Real,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                session_secret: Secret::default(),
                session_ttl_hours: 24,
                cookie_secure: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            auth: AuthConfig {
                provider: AuthProvider::Real,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.cookie_secure);
        assert_eq!(config.security.session_ttl_hours, 24);
        assert_eq!(config.auth.provider, AuthProvider::Real);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.cookie_secure);
        assert_eq!(config.database.max_connections, 50);
    }

    #[test]
    fn required_values_fail_loudly() {
        let err = AppConfig::from_lookup(lookup(&[("SESSION_SECRET", SECRET)])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/desk")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SESSION_SECRET")));

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/desk"),
            ("SESSION_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SESSION_SECRET", .. }));
    }

    #[test]
    fn overrides_apply_on_top_of_environment_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://db/desk"),
            ("SESSION_SECRET", SECRET),
            ("PORT", "8080"),
            ("SESSION_TTL_HOURS", "12"),
            ("SECURITY_CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.session_ttl_hours, 12);
        assert_eq!(config.security.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.security.session_secret.expose(), SECRET);
    }

    #[test]
    fn session_ttl_must_stay_in_range() {
        for bad in ["0", "-3", "8761", "9223372036854775807"] {
            let err = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/desk"),
                ("SESSION_SECRET", SECRET),
                ("SESSION_TTL_HOURS", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "SESSION_TTL_HOURS", .. }), "{}", bad);
        }

        for good in ["1", "8760"] {
            let config = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/desk"),
                ("SESSION_SECRET", SECRET),
                ("SESSION_TTL_HOURS", good),
            ]))
            .unwrap();
            assert_eq!(config.security.session_ttl_hours.to_string(), good);
        }
    }

    #[test]
    fn session_ttl_is_clamped_when_set_directly() {
        let mut security = AppConfig::development().security;
        security.session_ttl_hours = i64::MAX;
        assert_eq!(security.session_ttl(), chrono::Duration::hours(MAX_SESSION_TTL_HOURS));

        security.session_ttl_hours = 0;
        assert_eq!(security.session_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn fixed_test_user_is_configuration_only_and_never_in_production() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/desk"),
            ("SESSION_SECRET", SECRET),
            ("AUTH_PROVIDER", "fixed-test-user"),
        ]))
        .unwrap();
        assert_eq!(
            config.auth.provider,
            AuthProvider::FixedTestUser { username: DEFAULT_TEST_USERNAME.to_string() }
        );

        let err = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://db/desk"),
            ("SESSION_SECRET", SECRET),
            ("AUTH_PROVIDER", "fixed-test-user"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "AUTH_PROVIDER", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/desk"),
            ("SESSION_SECRET", SECRET),
            ("AUTH_PROVIDER", "emergency"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "AUTH_PROVIDER", .. }));
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let secret = Secret::new(SECRET);
        assert!(!format!("{:?}", secret).contains("0123"));
    }
}
