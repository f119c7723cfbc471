use std::sync::Arc;

use crate::auth::{self, IdentityResolver};
use crate::config::AppConfig;
use crate::db::pool::PoolError;
use crate::db::{PoolManager, SchemaManager, Store};
use crate::quotes::QuoteService;

/// Shared application state, assembled once at startup and cloned into
/// every handler. The schema manager lives here (not in a module-level
/// global) so its lifecycle is owned and resettable.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PoolManager,
    pub store: Store,
    pub schema: Arc<SchemaManager>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub quotes: Arc<QuoteService>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self, PoolError> {
        let db = PoolManager::connect(&config.database)?;
        let store = Store::new(db.pool());
        let schema = Arc::new(SchemaManager::new(config.environment));
        let resolver = auth::resolver_for(&config);
        let quotes = Arc::new(QuoteService::new(config.quotes.clone()));

        Ok(Self {
            config: Arc::new(config),
            db,
            store,
            schema,
            resolver,
            quotes,
        })
    }
}
