//! Portfolio CRUD. Every statement filters by the bound identity through
//! an explicit ownership predicate, independent of the row-visibility
//! policies enforced by the storage engine.

use crate::db::{ScopedStore, StoreError};
use crate::domain::models::{NewPortfolio, Portfolio, PortfolioSummary, UpdatePortfolio};
use crate::domain::DomainError;

const SUMMARY_SELECT: &str = "
    SELECT p.id, p.name, p.description,
           COUNT(i.id) AS investment_count,
           COALESCE(SUM(i.amount), 0) AS total_invested,
           p.created_at, p.updated_at
    FROM portfolios p
    LEFT JOIN investments i ON i.portfolio_id = p.id
    WHERE p.user_id = $1
";

pub async fn create(
    store: &ScopedStore,
    payload: NewPortfolio,
) -> Result<Portfolio, DomainError> {
    let mut conn = store.conn().await?;

    let portfolio = sqlx::query_as::<_, Portfolio>(
        "INSERT INTO portfolios (user_id, name, description)
         VALUES ($1, $2, $3)
         RETURNING id, user_id, name, description, created_at, updated_at",
    )
    .bind(store.user_id())
    .bind(&payload.name)
    .bind(&payload.description)
    .fetch_one(&mut *conn)
    .await
    .map_err(StoreError::from)
    .map_err(|e| match e {
        StoreError::UniqueViolation(_) => DomainError::DuplicateName("portfolio"),
        other => other.into(),
    })?;

    Ok(portfolio)
}

pub async fn list(store: &ScopedStore) -> Result<Vec<PortfolioSummary>, DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!("{} GROUP BY p.id ORDER BY p.name", SUMMARY_SELECT);
    let portfolios = sqlx::query_as::<_, PortfolioSummary>(&sql)
        .bind(store.user_id())
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    Ok(portfolios)
}

pub async fn get(store: &ScopedStore, id: i64) -> Result<PortfolioSummary, DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!("{} AND p.id = $2 GROUP BY p.id", SUMMARY_SELECT);
    sqlx::query_as::<_, PortfolioSummary>(&sql)
        .bind(store.user_id())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StoreError::from)?
        .ok_or(DomainError::NotFound)
}

pub async fn update(
    store: &ScopedStore,
    id: i64,
    payload: UpdatePortfolio,
) -> Result<Portfolio, DomainError> {
    let mut conn = store.conn().await?;

    let portfolio = sqlx::query_as::<_, Portfolio>(
        "UPDATE portfolios
         SET name = COALESCE($3, name),
             description = COALESCE($4, description)
         WHERE id = $2 AND user_id = $1
         RETURNING id, user_id, name, description, created_at, updated_at",
    )
    .bind(store.user_id())
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.description)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StoreError::from)
    .map_err(|e| match e {
        StoreError::UniqueViolation(_) => DomainError::DuplicateName("portfolio"),
        other => other.into(),
    })?
    .ok_or(DomainError::NotFound)?;

    Ok(portfolio)
}

/// Delete an owned portfolio. Rejected with a domain error while it still
/// holds investments; the referential guard lives here, not only in the
/// foreign key.
pub async fn delete(store: &ScopedStore, id: i64) -> Result<(), DomainError> {
    let mut tx = store.begin().await?;

    let investment_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM investments i
         JOIN portfolios p ON p.id = i.portfolio_id
         WHERE p.user_id = $1 AND i.portfolio_id = $2",
    )
    .bind(store.user_id())
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(StoreError::from)?;

    if investment_count > 0 {
        return Err(DomainError::PortfolioNotEmpty { investment_count });
    }

    let result = sqlx::query("DELETE FROM portfolios WHERE id = $2 AND user_id = $1")
        .bind(store.user_id())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(DomainError::NotFound);
    }

    tx.commit().await.map_err(StoreError::from)?;
    Ok(())
}
