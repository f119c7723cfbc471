use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres, Transaction};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Environment;

/// Errors from schema initialization and migration
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Migration step {version} ({name}) failed: {source}")]
    Step {
        version: i32,
        name: &'static str,
        source: sqlx::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Lifecycle state for the process. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Not yet checked this process lifetime
    Pending,
    /// Schema confirmed present (created or migrated as needed)
    Ready,
    /// Production mode: schema is provisioned out of band, never touched
    Skipped,
}

/// One row of the migration ledger
#[derive(Debug, sqlx::FromRow)]
pub struct AppliedMigration {
    pub version: i32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Ordered migration steps. Every step is idempotent (create-if-absent /
/// upsert), so a concurrent or repeated run is safe even before the ledger
/// row lands.
const STEPS: &[(i32, &str)] = &[
    (1, "create_users"),
    (2, "create_portfolios"),
    (3, "create_investments"),
    (4, "attach_investments_to_portfolios"),
    (5, "create_distributions"),
    (6, "create_labels"),
    (7, "create_snapshots"),
    (8, "create_indexes"),
    (9, "create_updated_at_triggers"),
    (10, "enable_row_security"),
    (11, "seed_dev_users"),
];

/// Ensures the relational schema exists before domain operations run.
///
/// Owned by application state and consulted on every request; after the
/// first successful pass the in-memory state short-circuits. The state
/// sits behind an async mutex so two concurrent first requests serialize
/// instead of racing, and so tests can reset it deterministically.
pub struct SchemaManager {
    environment: Environment,
    state: Mutex<SchemaState>,
}

impl SchemaManager {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            state: Mutex::new(SchemaState::Pending),
        }
    }

    pub async fn state(&self) -> SchemaState {
        *self.state.lock().await
    }

    /// Put the manager back to Pending. Test and CLI convenience; the
    /// underlying DDL is idempotent so a re-run is always safe.
    pub async fn reset(&self) {
        *self.state.lock().await = SchemaState::Pending;
    }

    /// Run (or skip) schema initialization. No-op after the first success.
    pub async fn ensure_ready(&self, pool: &PgPool) -> Result<SchemaState, SchemaError> {
        let mut state = self.state.lock().await;
        match *state {
            SchemaState::Ready | SchemaState::Skipped => return Ok(*state),
            SchemaState::Pending => {}
        }

        if self.environment.is_production() {
            warn!("production mode: skipping schema initialization, schema assumed pre-provisioned");
            *state = SchemaState::Skipped;
            return Ok(*state);
        }

        self.run_migrations(pool).await?;

        // State is only advanced on success, so a failed step retries from
        // the ledger on the next call.
        *state = SchemaState::Ready;
        info!("schema initialization complete");
        Ok(*state)
    }

    async fn run_migrations(&self, pool: &PgPool) -> Result<(), SchemaError> {
        pool.execute(CREATE_LEDGER)
            .await
            .map_err(|e| SchemaError::Connection(e.to_string()))?;

        let applied: Vec<i32> = sqlx::query_scalar("SELECT version FROM schema_migrations")
            .fetch_all(pool)
            .await?;

        for &(version, name) in STEPS {
            if applied.contains(&version) {
                continue;
            }

            let mut tx = pool
                .begin()
                .await
                .map_err(|e| SchemaError::Connection(e.to_string()))?;

            self.apply_step(&mut tx, version)
                .await
                .map_err(|source| SchemaError::Step { version, name, source })?;

            sqlx::query(
                "INSERT INTO schema_migrations (version, name) VALUES ($1, $2) \
                 ON CONFLICT (version) DO NOTHING",
            )
            .bind(version)
            .bind(name)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            info!("applied schema migration {} ({})", version, name);
        }

        Ok(())
    }

    async fn apply_step(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        match version {
            1 => (&mut **tx).execute(CREATE_USERS).await.map(|_| ()),
            2 => (&mut **tx).execute(CREATE_PORTFOLIOS).await.map(|_| ()),
            3 => (&mut **tx).execute(CREATE_INVESTMENTS).await.map(|_| ()),
            4 => self.attach_investments_to_portfolios(tx).await,
            5 => (&mut **tx).execute(CREATE_DISTRIBUTIONS).await.map(|_| ()),
            6 => (&mut **tx).execute(CREATE_LABELS).await.map(|_| ()),
            7 => (&mut **tx).execute(CREATE_SNAPSHOTS).await.map(|_| ()),
            8 => (&mut **tx).execute(CREATE_INDEXES).await.map(|_| ()),
            9 => (&mut **tx).execute(CREATE_UPDATED_AT_TRIGGERS).await.map(|_| ()),
            10 => (&mut **tx).execute(ENABLE_ROW_SECURITY).await.map(|_| ()),
            11 => (&mut **tx).execute(SEED_DEV_USERS).await.map(|_| ()),
            other => unreachable!("unknown migration version {}", other),
        }
    }

    /// One-time structural migration for deployments that predate the
    /// portfolio grouping level: their `investments` table carries a
    /// NOT NULL `user_id` and no `portfolio_id`. Each statement tolerates
    /// re-running; fresh installs see the column already present and fall
    /// through.
    async fn attach_investments_to_portfolios(
        &self,
        tx: &mut Transaction<'static, Postgres>,
    ) -> Result<(), sqlx::Error> {
        let has_portfolio_column: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM information_schema.columns
                 WHERE table_name = 'investments' AND column_name = 'portfolio_id'
             )",
        )
        .fetch_one(&mut **tx)
        .await?;

        if has_portfolio_column {
            return Ok(());
        }

        info!("legacy investments layout detected, attaching portfolio grouping level");

        (&mut **tx)
            .execute(
                "ALTER TABLE investments ADD COLUMN IF NOT EXISTS portfolio_id BIGINT REFERENCES portfolios(id)",
            )
            .await?;

        // One default portfolio per distinct legacy owner
        (&mut **tx).execute(
            "INSERT INTO portfolios (user_id, name)
             SELECT DISTINCT user_id, 'My Portfolio' FROM investments WHERE user_id IS NOT NULL
             ON CONFLICT (user_id, name) DO NOTHING",
        )
        .await?;

        (&mut **tx).execute(
            "UPDATE investments i
             SET portfolio_id = p.id
             FROM portfolios p
             WHERE i.portfolio_id IS NULL
               AND p.user_id = i.user_id
               AND p.name = 'My Portfolio'",
        )
        .await?;

        // No-op when the column is already nullable
        (&mut **tx)
            .execute("ALTER TABLE investments ALTER COLUMN user_id DROP NOT NULL")
            .await?;

        Ok(())
    }

    /// Applied ledger rows, oldest first
    pub async fn status(pool: &PgPool) -> Result<Vec<AppliedMigration>, SchemaError> {
        pool.execute(CREATE_LEDGER)
            .await
            .map_err(|e| SchemaError::Connection(e.to_string()))?;

        let rows = sqlx::query_as::<_, AppliedMigration>(
            "SELECT version, name, applied_at FROM schema_migrations ORDER BY version",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

const CREATE_LEDGER: &str = "
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CREATE_USERS: &str = "
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CREATE_PORTFOLIOS: &str = "
CREATE TABLE IF NOT EXISTS portfolios (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, name)
);
";

const CREATE_INVESTMENTS: &str = "
CREATE TABLE IF NOT EXISTS investments (
    id BIGSERIAL PRIMARY KEY,
    portfolio_id BIGINT REFERENCES portfolios(id),
    user_id BIGINT REFERENCES users(id),
    name TEXT NOT NULL,
    description TEXT,
    start_date DATE,
    amount NUMERIC(18,2) NOT NULL DEFAULT 0 CHECK (amount >= 0),
    investment_type TEXT NOT NULL DEFAULT '',
    ticker_symbol TEXT,
    shares NUMERIC(20,8),
    current_price NUMERIC(20,8),
    price_updated_at TIMESTAMPTZ,
    has_distributions BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CREATE_DISTRIBUTIONS: &str = "
CREATE TABLE IF NOT EXISTS distributions (
    id BIGSERIAL PRIMARY KEY,
    investment_id BIGINT NOT NULL REFERENCES investments(id) ON DELETE CASCADE,
    distribution_date DATE NOT NULL,
    amount NUMERIC(18,2) NOT NULL CHECK (amount >= 0),
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CREATE_LABELS: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS tags (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS investment_types (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS investment_categories (
    investment_id BIGINT NOT NULL REFERENCES investments(id) ON DELETE CASCADE,
    category_id BIGINT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    PRIMARY KEY (investment_id, category_id)
);

CREATE TABLE IF NOT EXISTS investment_tags (
    investment_id BIGINT NOT NULL REFERENCES investments(id) ON DELETE CASCADE,
    tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (investment_id, tag_id)
);
";

const CREATE_SNAPSHOTS: &str = "
CREATE TABLE IF NOT EXISTS portfolio_snapshots (
    id BIGSERIAL PRIMARY KEY,
    portfolio_id BIGINT NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
    snapshot_date DATE NOT NULL,
    total_value NUMERIC(18,2) NOT NULL,
    total_invested NUMERIC(18,2) NOT NULL,
    total_distributions NUMERIC(18,2) NOT NULL,
    investment_count BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (portfolio_id, snapshot_date)
);

CREATE TABLE IF NOT EXISTS user_snapshots (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    snapshot_date DATE NOT NULL,
    total_value NUMERIC(18,2) NOT NULL,
    total_invested NUMERIC(18,2) NOT NULL,
    total_distributions NUMERIC(18,2) NOT NULL,
    investment_count BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (user_id, snapshot_date)
);

CREATE TABLE IF NOT EXISTS investment_snapshots (
    id BIGSERIAL PRIMARY KEY,
    investment_id BIGINT NOT NULL REFERENCES investments(id) ON DELETE CASCADE,
    snapshot_date DATE NOT NULL,
    total_value NUMERIC(18,2) NOT NULL,
    total_invested NUMERIC(18,2) NOT NULL,
    total_distributions NUMERIC(18,2) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (investment_id, snapshot_date)
);
";

const CREATE_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_portfolios_user ON portfolios(user_id);
CREATE INDEX IF NOT EXISTS idx_investments_portfolio ON investments(portfolio_id);
CREATE INDEX IF NOT EXISTS idx_distributions_investment ON distributions(investment_id);
CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);
CREATE INDEX IF NOT EXISTS idx_tags_user ON tags(user_id);
CREATE INDEX IF NOT EXISTS idx_investment_types_user ON investment_types(user_id);
CREATE INDEX IF NOT EXISTS idx_portfolio_snapshots_date ON portfolio_snapshots(portfolio_id, snapshot_date);
CREATE INDEX IF NOT EXISTS idx_user_snapshots_date ON user_snapshots(user_id, snapshot_date);
CREATE INDEX IF NOT EXISTS idx_investment_snapshots_date ON investment_snapshots(investment_id, snapshot_date);
";

const CREATE_UPDATED_AT_TRIGGERS: &str = "
CREATE OR REPLACE FUNCTION touch_updated_at() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS trg_users_touch ON users;
CREATE TRIGGER trg_users_touch BEFORE UPDATE ON users
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

DROP TRIGGER IF EXISTS trg_portfolios_touch ON portfolios;
CREATE TRIGGER trg_portfolios_touch BEFORE UPDATE ON portfolios
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

DROP TRIGGER IF EXISTS trg_investments_touch ON investments;
CREATE TRIGGER trg_investments_touch BEFORE UPDATE ON investments
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

DROP TRIGGER IF EXISTS trg_distributions_touch ON distributions;
CREATE TRIGGER trg_distributions_touch BEFORE UPDATE ON distributions
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

DROP TRIGGER IF EXISTS trg_categories_touch ON categories;
CREATE TRIGGER trg_categories_touch BEFORE UPDATE ON categories
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

DROP TRIGGER IF EXISTS trg_tags_touch ON tags;
CREATE TRIGGER trg_tags_touch BEFORE UPDATE ON tags
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

DROP TRIGGER IF EXISTS trg_investment_types_touch ON investment_types;
CREATE TRIGGER trg_investment_types_touch BEFORE UPDATE ON investment_types
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
";

/// Row-visibility policies keyed on the session parameter bound by
/// [`crate::db::session::ScopedStore`]. `current_setting(..., true)`
/// returns NULL when unbound, so an unbound session sees nothing.
/// The `users` table stays policy-free: it is the identity root, not a
/// tenant-scoped table, and is only ever read by id.
const ENABLE_ROW_SECURITY: &str = "
ALTER TABLE portfolios ENABLE ROW LEVEL SECURITY;
ALTER TABLE portfolios FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS portfolios_tenant ON portfolios;
CREATE POLICY portfolios_tenant ON portfolios
    USING (user_id = current_setting('app.current_user_id', true)::bigint)
    WITH CHECK (user_id = current_setting('app.current_user_id', true)::bigint);

ALTER TABLE investments ENABLE ROW LEVEL SECURITY;
ALTER TABLE investments FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS investments_tenant ON investments;
CREATE POLICY investments_tenant ON investments
    USING (
        portfolio_id IN (SELECT id FROM portfolios
                         WHERE user_id = current_setting('app.current_user_id', true)::bigint)
        OR user_id = current_setting('app.current_user_id', true)::bigint
    )
    WITH CHECK (
        portfolio_id IN (SELECT id FROM portfolios
                         WHERE user_id = current_setting('app.current_user_id', true)::bigint)
    );

ALTER TABLE distributions ENABLE ROW LEVEL SECURITY;
ALTER TABLE distributions FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS distributions_tenant ON distributions;
CREATE POLICY distributions_tenant ON distributions
    USING (investment_id IN (
        SELECT i.id FROM investments i
        JOIN portfolios p ON p.id = i.portfolio_id
        WHERE p.user_id = current_setting('app.current_user_id', true)::bigint))
    WITH CHECK (investment_id IN (
        SELECT i.id FROM investments i
        JOIN portfolios p ON p.id = i.portfolio_id
        WHERE p.user_id = current_setting('app.current_user_id', true)::bigint));

ALTER TABLE categories ENABLE ROW LEVEL SECURITY;
ALTER TABLE categories FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS categories_tenant ON categories;
CREATE POLICY categories_tenant ON categories
    USING (user_id = current_setting('app.current_user_id', true)::bigint)
    WITH CHECK (user_id = current_setting('app.current_user_id', true)::bigint);

ALTER TABLE tags ENABLE ROW LEVEL SECURITY;
ALTER TABLE tags FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS tags_tenant ON tags;
CREATE POLICY tags_tenant ON tags
    USING (user_id = current_setting('app.current_user_id', true)::bigint)
    WITH CHECK (user_id = current_setting('app.current_user_id', true)::bigint);

ALTER TABLE investment_types ENABLE ROW LEVEL SECURITY;
ALTER TABLE investment_types FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS investment_types_tenant ON investment_types;
CREATE POLICY investment_types_tenant ON investment_types
    USING (user_id = current_setting('app.current_user_id', true)::bigint)
    WITH CHECK (user_id = current_setting('app.current_user_id', true)::bigint);

ALTER TABLE investment_categories ENABLE ROW LEVEL SECURITY;
ALTER TABLE investment_categories FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS investment_categories_tenant ON investment_categories;
CREATE POLICY investment_categories_tenant ON investment_categories
    USING (
        investment_id IN (
            SELECT i.id FROM investments i
            JOIN portfolios p ON p.id = i.portfolio_id
            WHERE p.user_id = current_setting('app.current_user_id', true)::bigint)
        AND category_id IN (
            SELECT id FROM categories
            WHERE user_id = current_setting('app.current_user_id', true)::bigint)
    )
    WITH CHECK (
        investment_id IN (
            SELECT i.id FROM investments i
            JOIN portfolios p ON p.id = i.portfolio_id
            WHERE p.user_id = current_setting('app.current_user_id', true)::bigint)
        AND category_id IN (
            SELECT id FROM categories
            WHERE user_id = current_setting('app.current_user_id', true)::bigint)
    );

ALTER TABLE investment_tags ENABLE ROW LEVEL SECURITY;
ALTER TABLE investment_tags FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS investment_tags_tenant ON investment_tags;
CREATE POLICY investment_tags_tenant ON investment_tags
    USING (
        investment_id IN (
            SELECT i.id FROM investments i
            JOIN portfolios p ON p.id = i.portfolio_id
            WHERE p.user_id = current_setting('app.current_user_id', true)::bigint)
        AND tag_id IN (
            SELECT id FROM tags
            WHERE user_id = current_setting('app.current_user_id', true)::bigint)
    )
    WITH CHECK (
        investment_id IN (
            SELECT i.id FROM investments i
            JOIN portfolios p ON p.id = i.portfolio_id
            WHERE p.user_id = current_setting('app.current_user_id', true)::bigint)
        AND tag_id IN (
            SELECT id FROM tags
            WHERE user_id = current_setting('app.current_user_id', true)::bigint)
    );

ALTER TABLE portfolio_snapshots ENABLE ROW LEVEL SECURITY;
ALTER TABLE portfolio_snapshots FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS portfolio_snapshots_tenant ON portfolio_snapshots;
CREATE POLICY portfolio_snapshots_tenant ON portfolio_snapshots
    USING (portfolio_id IN (SELECT id FROM portfolios
                            WHERE user_id = current_setting('app.current_user_id', true)::bigint))
    WITH CHECK (portfolio_id IN (SELECT id FROM portfolios
                                 WHERE user_id = current_setting('app.current_user_id', true)::bigint));

ALTER TABLE user_snapshots ENABLE ROW LEVEL SECURITY;
ALTER TABLE user_snapshots FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS user_snapshots_tenant ON user_snapshots;
CREATE POLICY user_snapshots_tenant ON user_snapshots
    USING (user_id = current_setting('app.current_user_id', true)::bigint)
    WITH CHECK (user_id = current_setting('app.current_user_id', true)::bigint);

ALTER TABLE investment_snapshots ENABLE ROW LEVEL SECURITY;
ALTER TABLE investment_snapshots FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS investment_snapshots_tenant ON investment_snapshots;
CREATE POLICY investment_snapshots_tenant ON investment_snapshots
    USING (investment_id IN (
        SELECT i.id FROM investments i
        JOIN portfolios p ON p.id = i.portfolio_id
        WHERE p.user_id = current_setting('app.current_user_id', true)::bigint))
    WITH CHECK (investment_id IN (
        SELECT i.id FROM investments i
        JOIN portfolios p ON p.id = i.portfolio_id
        WHERE p.user_id = current_setting('app.current_user_id', true)::bigint));
";

const SEED_DEV_USERS: &str = "
INSERT INTO users (email, display_name) VALUES
    ('dev@example.com', 'Dev User'),
    ('demo@example.com', 'Demo User')
ON CONFLICT (email) DO NOTHING;
";
