//! External price-quote provider client.
//!
//! The provider is rate limited (a ~25 requests/day class of free tier)
//! and treated as unreliable and optional: lookups run behind the request
//! path as fire-and-forget work, failures are logged and swallowed, and a
//! tripped rate-limit latch stops further outbound calls for the process
//! lifetime instead of retrying.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::QuoteConfig;
use crate::db::ScopedStore;
use crate::domain::investments;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Quote provider disabled: no API key configured")]
    Disabled,

    #[error("Quote provider rate limit reached")]
    RateLimited,

    #[error("Quote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed quote response: {0}")]
    Malformed(String),
}

pub struct QuoteService {
    client: reqwest::Client,
    config: QuoteConfig,
    rate_limited: AtomicBool,
    requests_made: AtomicU32,
}

impl QuoteService {
    pub fn new(config: QuoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            rate_limited: AtomicBool::new(false),
            requests_made: AtomicU32::new(0),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited.load(Ordering::Relaxed)
    }

    /// Look up the last traded price for a symbol. Counts against the
    /// daily budget and latches the rate-limit flag when the provider
    /// pushes back.
    pub async fn lookup(&self, symbol: &str) -> Result<Decimal, QuoteError> {
        let api_key = self.config.api_key.as_deref().ok_or(QuoteError::Disabled)?;

        if self.is_rate_limited() {
            return Err(QuoteError::RateLimited);
        }
        if self.requests_made.fetch_add(1, Ordering::Relaxed) >= self.config.daily_request_limit {
            self.rate_limited.store(true, Ordering::Relaxed);
            return Err(QuoteError::RateLimited);
        }

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", api_key),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.rate_limited.store(true, Ordering::Relaxed);
            return Err(QuoteError::RateLimited);
        }

        let body: Value = response.json().await?;
        match parse_global_quote(&body) {
            Err(QuoteError::RateLimited) => {
                self.rate_limited.store(true, Ordering::Relaxed);
                Err(QuoteError::RateLimited)
            }
            other => other,
        }
    }

    /// Refresh prices for every owned, tickered investment whose quote is
    /// older than the staleness window. Fire-and-forget: the caller's page
    /// render never waits on or fails from this.
    pub fn spawn_refresh(self: &Arc<Self>, store: ScopedStore) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.refresh_stale(&store).await {
                debug!("price refresh skipped: {}", e);
            }
        });
    }

    async fn refresh_stale(&self, store: &ScopedStore) -> Result<(), QuoteError> {
        if self.config.api_key.is_none() || self.is_rate_limited() {
            return Ok(());
        }

        let stale = match stale_symbols(store, self.config.staleness_hours).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("price refresh could not list stale investments: {}", e);
                return Ok(());
            }
        };

        for (investment_id, symbol) in stale {
            match self.lookup(&symbol).await {
                Ok(price) => {
                    if let Err(e) = investments::record_price(store, investment_id, price).await {
                        warn!("failed to record price for {}: {}", symbol, e);
                    }
                }
                Err(QuoteError::RateLimited) => {
                    // Self-limit: no further outbound calls this process
                    warn!("quote provider rate limit hit, suspending price refresh");
                    break;
                }
                Err(e) => {
                    // Degraded freshness only, never an error for the caller
                    debug!("price lookup failed for {}: {}", symbol, e);
                }
            }
        }

        Ok(())
    }
}

/// Pull the price out of a GLOBAL_QUOTE response body. Free-tier limit
/// responses arrive as 200s with a "Note"/"Information" field, which we
/// treat as a rate-limit signal.
fn parse_global_quote(body: &Value) -> Result<Decimal, QuoteError> {
    if body.get("Note").is_some() || body.get("Information").is_some() {
        return Err(QuoteError::RateLimited);
    }

    let price = body
        .get("Global Quote")
        .and_then(|q| q.get("05. price"))
        .and_then(|p| p.as_str())
        .ok_or_else(|| QuoteError::Malformed("missing \"05. price\" field".into()))?;

    Decimal::from_str(price.trim())
        .map_err(|e| QuoteError::Malformed(format!("unparseable price {:?}: {}", price, e)))
}

async fn stale_symbols(
    store: &ScopedStore,
    staleness_hours: i64,
) -> Result<Vec<(i64, String)>, crate::db::StoreError> {
    let mut conn = store.conn().await?;

    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT i.id, i.ticker_symbol
         FROM investments i
         JOIN portfolios p ON p.id = i.portfolio_id
         WHERE p.user_id = $1
           AND i.ticker_symbol IS NOT NULL
           AND (i.price_updated_at IS NULL
                OR i.price_updated_at < now() - make_interval(hours => $2))
         ORDER BY i.price_updated_at NULLS FIRST",
    )
    .bind(store.user_id())
    .bind(staleness_hours as i32)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn test_config(api_key: Option<&str>, limit: u32) -> QuoteConfig {
        QuoteConfig {
            base_url: "http://127.0.0.1:9/query".to_string(),
            api_key: api_key.map(String::from),
            daily_request_limit: limit,
            staleness_hours: 24,
        }
    }

    #[test]
    fn parses_a_global_quote_price() {
        let body = json!({
            "Global Quote": {
                "01. symbol": "AAPL",
                "05. price": "211.2700"
            }
        });
        assert_eq!(parse_global_quote(&body).unwrap(), dec!(211.2700));
    }

    #[test]
    fn treats_provider_notes_as_rate_limiting() {
        let body = json!({
            "Note": "Thank you for using our API! Our standard API rate limit is 25 requests per day."
        });
        assert!(matches!(
            parse_global_quote(&body),
            Err(QuoteError::RateLimited)
        ));
    }

    #[test]
    fn rejects_bodies_without_a_price() {
        let body = json!({ "Global Quote": {} });
        assert!(matches!(
            parse_global_quote(&body),
            Err(QuoteError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn lookup_without_api_key_is_disabled() {
        let service = QuoteService::new(test_config(None, 25));
        assert!(matches!(
            service.lookup("AAPL").await,
            Err(QuoteError::Disabled)
        ));
    }

    #[tokio::test]
    async fn daily_budget_latches_the_rate_limit() {
        // Budget of zero: the very first call trips the latch without any
        // network traffic.
        let service = QuoteService::new(test_config(Some("key"), 0));
        assert!(!service.is_rate_limited());
        assert!(matches!(
            service.lookup("AAPL").await,
            Err(QuoteError::RateLimited)
        ));
        assert!(service.is_rate_limited());
    }
}
