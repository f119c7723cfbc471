use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub identity: IdentityConfig,
    pub quotes: QuoteConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub database_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

/// How the bound identity is resolved per request.
///
/// Outside production an operator override (FOLIO_DEV_USER_ID) is honored,
/// falling back to `default_dev_user`. In production only a verified bearer
/// token is accepted; `jwt_secret` left unset means identity resolution
/// fails closed rather than defaulting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub dev_user_override: Option<i64>,
    pub default_dev_user: i64,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub daily_request_limit: u32,
    pub staleness_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT") {
            self.database.connect_timeout_secs =
                v.parse().unwrap_or(self.database.connect_timeout_secs);
        }
        if let Ok(v) = env::var("FOLIO_DB_NAME") {
            self.database.database_name = v;
        }
        if let Ok(v) = env::var("FOLIO_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("FOLIO_DEV_USER_ID") {
            self.identity.dev_user_override = v.parse().ok();
        }
        if let Ok(v) = env::var("FOLIO_JWT_SECRET") {
            if !v.is_empty() {
                self.identity.jwt_secret = Some(v);
            }
        }
        if let Ok(v) = env::var("QUOTE_BASE_URL") {
            self.quotes.base_url = v;
        }
        if let Ok(v) = env::var("QUOTE_API_KEY") {
            if !v.is_empty() {
                self.quotes.api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("QUOTE_DAILY_LIMIT") {
            self.quotes.daily_request_limit =
                v.parse().unwrap_or(self.quotes.daily_request_limit);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connect_timeout_secs: 30,
                database_name: "folio_dev".to_string(),
            },
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                enable_request_logging: true,
            },
            identity: IdentityConfig {
                dev_user_override: None,
                default_dev_user: 1,
                jwt_secret: None,
            },
            quotes: QuoteConfig {
                base_url: "https://www.alphavantage.co/query".to_string(),
                api_key: None,
                daily_request_limit: 25,
                staleness_hours: 24,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connect_timeout_secs: 10,
                database_name: "folio_staging".to_string(),
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connect_timeout_secs: 5,
                database_name: "folio".to_string(),
            },
            api: ApiConfig {
                port: 3000,
                enable_cors: false,
                enable_request_logging: false,
            },
            identity: IdentityConfig {
                // No development fallback in production: jwt_secret must be
                // supplied or identity resolution fails closed.
                dev_user_override: None,
                default_dev_user: 1,
                jwt_secret: None,
            },
            quotes: QuoteConfig {
                base_url: "https://www.alphavantage.co/query".to_string(),
                api_key: None,
                daily_request_limit: 25,
                staleness_hours: 24,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert!(!config.environment.is_production());
        assert_eq!(config.identity.default_dev_user, 1);
        assert!(config.api.enable_cors);
        assert_eq!(config.quotes.daily_request_limit, 25);
    }

    #[test]
    fn production_defaults_carry_no_identity_fallback() {
        let config = AppConfig::production();
        assert!(config.environment.is_production());
        assert!(config.identity.dev_user_override.is_none());
        assert!(config.identity.jwt_secret.is_none());
        assert!(!config.api.enable_cors);
    }
}
