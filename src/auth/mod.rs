use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::db::Identity;

/// Claims carried by a verified session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Unauthorized(String),

    /// Production mode with no credential mechanism wired up. This is a
    /// configuration fault and never falls back to a default identity.
    #[error("No identity resolution mechanism is configured")]
    NotConfigured,
}

/// Strategy for resolving "who is making this request".
///
/// Selected once at startup by deployment mode, so production can never
/// inherit the development fallback.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, IdentityError>;
}

/// Non-production resolution: an operator-supplied override, else a fixed
/// default identity.
pub struct DevOverrideResolver {
    override_id: Option<i64>,
    default_id: i64,
}

#[async_trait]
impl IdentityResolver for DevOverrideResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Identity, IdentityError> {
        Ok(Identity(self.override_id.unwrap_or(self.default_id)))
    }
}

/// Production resolution: a verified HS256 bearer token. Fails closed when
/// no signing secret is configured.
pub struct BearerTokenResolver {
    secret: Option<String>,
}

#[async_trait]
impl IdentityResolver for BearerTokenResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, IdentityError> {
        let secret = self.secret.as_deref().ok_or(IdentityError::NotConfigured)?;

        let token = extract_bearer_token(headers)?;
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let validation = Validation::default();

        let token_data = decode::<Claims>(&token, &decoding_key, &validation)
            .map_err(|e| IdentityError::Unauthorized(format!("Invalid session token: {}", e)))?;

        Ok(Identity(token_data.claims.user_id))
    }
}

/// Extract a bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, IdentityError> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| IdentityError::Unauthorized("Missing Authorization header".into()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| IdentityError::Unauthorized("Invalid Authorization header format".into()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        Some(_) => Err(IdentityError::Unauthorized("Empty bearer token".into())),
        None => Err(IdentityError::Unauthorized(
            "Authorization header must use Bearer token format".into(),
        )),
    }
}

/// Issue a session token (CLI and test tooling)
pub fn issue_token(user_id: i64, secret: &str, ttl_hours: i64) -> Result<String, IdentityError> {
    let claims = Claims::new(user_id, ttl_hours);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| IdentityError::Unauthorized(format!("Token generation failed: {}", e)))
}

/// Pick the resolution strategy for this deployment mode
pub fn resolver_for(config: &AppConfig) -> Arc<dyn IdentityResolver> {
    if config.environment.is_production() {
        Arc::new(BearerTokenResolver {
            secret: config.identity.jwt_secret.clone(),
        })
    } else {
        Arc::new(DevOverrideResolver {
            override_id: config.identity.dev_user_override,
            default_id: config.identity.default_dev_user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn dev_resolver_prefers_override() {
        let resolver = DevOverrideResolver {
            override_id: Some(7),
            default_id: 1,
        };
        let id = resolver.resolve(&HeaderMap::new()).await.unwrap();
        assert_eq!(id, Identity(7));
    }

    #[tokio::test]
    async fn dev_resolver_falls_back_to_default() {
        let resolver = DevOverrideResolver {
            override_id: None,
            default_id: 1,
        };
        let id = resolver.resolve(&HeaderMap::new()).await.unwrap();
        assert_eq!(id, Identity(1));
    }

    #[tokio::test]
    async fn bearer_resolver_fails_closed_without_secret() {
        let resolver = BearerTokenResolver { secret: None };
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer whatever"));

        let err = resolver.resolve(&headers).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured));
    }

    #[tokio::test]
    async fn bearer_resolver_round_trips_issued_token() {
        let secret = "test-secret";
        let token = issue_token(42, secret, 1).unwrap();

        let resolver = BearerTokenResolver {
            secret: Some(secret.to_string()),
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let id = resolver.resolve(&headers).await.unwrap();
        assert_eq!(id, Identity(42));
    }

    #[tokio::test]
    async fn bearer_resolver_rejects_garbage_tokens() {
        let resolver = BearerTokenResolver {
            secret: Some("test-secret".to_string()),
        };
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer nope"));

        let err = resolver.resolve(&headers).await.unwrap_err();
        assert!(matches!(err, IdentityError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn production_strategy_never_defaults() {
        let mut config = crate::config::AppConfig::from_env();
        config.environment = crate::config::Environment::Production;
        config.identity.jwt_secret = None;
        // Even a user id override in the environment must not leak into
        // the production strategy.
        config.identity.dev_user_override = Some(1);

        let resolver = resolver_for(&config);
        let err = resolver.resolve(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured));
    }
}
