use serde::Serialize;
use sqlx::{pool::PoolConnection, PgPool, Postgres, Transaction};
use thiserror::Error;

/// The user id bound to the current request. Resolved once by the identity
/// middleware and carried through every tenant-scoped storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity(pub i64);

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from tenant-scoped storage access
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    UniqueViolation(String),

    #[error("{0}")]
    CheckViolation(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => {
                    StoreError::UniqueViolation("A record with that value already exists".into())
                }
                Some("23514") => {
                    StoreError::CheckViolation("A value violates a data constraint".into())
                }
                // Row security rejections are reported as not-found so a
                // caller learns nothing about foreign rows.
                Some("42501") => StoreError::NotFound,
                _ => StoreError::Sqlx(err),
            },
            _ => StoreError::Sqlx(err),
        }
    }
}

/// Session parameter the row-visibility policies read.
pub const IDENTITY_SETTING: &str = "app.current_user_id";

const BIND_SESSION: &str = "SELECT set_config('app.current_user_id', $1, false)";
const BIND_TRANSACTION: &str = "SELECT set_config('app.current_user_id', $1, true)";

/// Unscoped handle on the connection pool. Domain code never uses this
/// directly; it asks for a [`ScopedStore`] bound to one identity.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn scoped(&self, identity: Identity) -> ScopedStore {
        ScopedStore {
            pool: self.pool.clone(),
            identity,
        }
    }
}

/// Pool handle bound to one identity.
///
/// Every acquired connection has the identity written into the
/// `app.current_user_id` session parameter before any statement runs, so
/// the row-visibility policies always see the caller that owns the
/// request. Connections return to the pool with a stale binding, which is
/// harmless: the next scoped use re-binds before issuing statements.
#[derive(Clone)]
pub struct ScopedStore {
    pool: PgPool,
    identity: Identity,
}

impl ScopedStore {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn user_id(&self) -> i64 {
        self.identity.0
    }

    /// Acquire a connection with the identity bound for this session.
    pub async fn conn(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(BIND_SESSION)
            .bind(self.identity.0.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(conn)
    }

    /// Begin a transaction with the identity bound transaction-locally.
    /// Multi-statement domain operations run inside one of these so a
    /// partial failure rolls back the whole unit.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(BIND_TRANSACTION)
            .bind(self.identity.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_statements_target_the_policy_setting() {
        assert!(BIND_SESSION.contains(IDENTITY_SETTING));
        assert!(BIND_TRANSACTION.contains(IDENTITY_SETTING));
        // Transaction binding must not leak past COMMIT/ROLLBACK
        assert!(BIND_TRANSACTION.ends_with("true)"));
        assert!(BIND_SESSION.ends_with("false)"));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn identity_displays_as_plain_id() {
        assert_eq!(Identity(42).to_string(), "42");
    }
}
