//! Distribution CRUD, always reached through an owned investment.

use rust_decimal::Decimal;

use crate::db::{ScopedStore, StoreError};
use crate::domain::models::{Distribution, NewDistribution, UpdateDistribution};
use crate::domain::DomainError;

const OWNED_INVESTMENTS: &str =
    "SELECT i.id FROM investments i JOIN portfolios p ON p.id = i.portfolio_id WHERE p.user_id = $1";

const DISTRIBUTION_RETURNING: &str =
    "RETURNING id, investment_id, distribution_date, amount, description, created_at, updated_at";

pub async fn create(
    store: &ScopedStore,
    investment_id: i64,
    payload: NewDistribution,
) -> Result<Distribution, DomainError> {
    if payload.amount < Decimal::ZERO {
        return Err(DomainError::NegativeAmount("amount"));
    }

    let mut conn = store.conn().await?;

    let sql = format!(
        "INSERT INTO distributions (investment_id, distribution_date, amount, description)
         SELECT $2, $3, $4, $5
         WHERE $2 IN ({}) {}",
        OWNED_INVESTMENTS, DISTRIBUTION_RETURNING
    );
    sqlx::query_as::<_, Distribution>(&sql)
        .bind(store.user_id())
        .bind(investment_id)
        .bind(payload.distribution_date)
        .bind(payload.amount)
        .bind(&payload.description)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StoreError::from)?
        .ok_or(DomainError::NotFound)
}

pub async fn list(
    store: &ScopedStore,
    investment_id: i64,
) -> Result<Vec<Distribution>, DomainError> {
    let mut conn = store.conn().await?;

    // Distinguish an empty list from a foreign/absent investment
    let owned: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM ({}) owned WHERE id = $2",
        OWNED_INVESTMENTS
    ))
    .bind(store.user_id())
    .bind(investment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StoreError::from)?;
    if owned.is_none() {
        return Err(DomainError::NotFound);
    }

    let distributions = sqlx::query_as::<_, Distribution>(
        "SELECT id, investment_id, distribution_date, amount, description, created_at, updated_at
         FROM distributions
         WHERE investment_id = $1
         ORDER BY distribution_date DESC, id DESC",
    )
    .bind(investment_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::from)?;

    Ok(distributions)
}

pub async fn update(
    store: &ScopedStore,
    id: i64,
    payload: UpdateDistribution,
) -> Result<Distribution, DomainError> {
    if matches!(payload.amount, Some(a) if a < Decimal::ZERO) {
        return Err(DomainError::NegativeAmount("amount"));
    }

    let mut conn = store.conn().await?;

    let sql = format!(
        "UPDATE distributions
         SET distribution_date = COALESCE($3, distribution_date),
             amount = COALESCE($4, amount),
             description = COALESCE($5, description)
         WHERE id = $2 AND investment_id IN ({}) {}",
        OWNED_INVESTMENTS, DISTRIBUTION_RETURNING
    );
    sqlx::query_as::<_, Distribution>(&sql)
        .bind(store.user_id())
        .bind(id)
        .bind(payload.distribution_date)
        .bind(payload.amount)
        .bind(&payload.description)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StoreError::from)?
        .ok_or(DomainError::NotFound)
}

pub async fn delete(store: &ScopedStore, id: i64) -> Result<(), DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!(
        "DELETE FROM distributions WHERE id = $2 AND investment_id IN ({})",
        OWNED_INVESTMENTS
    );
    let result = sqlx::query(&sql)
        .bind(store.user_id())
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(DomainError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_scopes_through_the_ownership_chain() {
        assert!(OWNED_INVESTMENTS.contains("JOIN portfolios p"));
        assert!(OWNED_INVESTMENTS.contains("p.user_id = $1"));
    }
}
