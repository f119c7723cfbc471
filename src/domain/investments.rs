//! Investment CRUD. Ownership is transitive (investment → portfolio →
//! user); every statement joins through that chain and filters by the
//! bound identity in addition to the storage-level policies.

use rust_decimal::Decimal;

use crate::db::{ScopedStore, StoreError};
use crate::domain::models::{Investment, InvestmentDetail, NewInvestment, UpdateInvestment};
use crate::domain::DomainError;

const DETAIL_SELECT: &str = "
    SELECT i.id, i.portfolio_id, i.name, i.description, i.start_date, i.amount,
           i.investment_type, i.ticker_symbol, i.shares, i.current_price,
           i.price_updated_at, i.has_distributions, i.created_at, i.updated_at,
           COALESCE(d.total, 0) AS total_distributions,
           COALESCE(d.total, 0) - i.amount
             + CASE WHEN i.shares IS NOT NULL AND i.current_price IS NOT NULL
                    THEN i.shares * i.current_price
                    ELSE 0 END AS current_return
    FROM investments i
    JOIN portfolios p ON p.id = i.portfolio_id
    LEFT JOIN (SELECT investment_id, SUM(amount) AS total
               FROM distributions GROUP BY investment_id) d
           ON d.investment_id = i.id
    WHERE p.user_id = $1
";

const INVESTMENT_RETURNING: &str = "
    RETURNING id, portfolio_id, name, description, start_date, amount,
              investment_type, ticker_symbol, shares, current_price,
              price_updated_at, has_distributions, created_at, updated_at";

/// Create an investment, with optional category/tag associations applied
/// in the same transaction. The legacy `user_id` column is never written.
pub async fn create(
    store: &ScopedStore,
    payload: NewInvestment,
) -> Result<Investment, DomainError> {
    if payload.amount < Decimal::ZERO {
        return Err(DomainError::NegativeAmount("amount"));
    }

    let mut tx = store.begin().await?;

    // The target portfolio must belong to the bound identity
    let owned: Option<i64> =
        sqlx::query_scalar("SELECT id FROM portfolios WHERE id = $2 AND user_id = $1")
            .bind(store.user_id())
            .bind(payload.portfolio_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?;
    if owned.is_none() {
        return Err(DomainError::NotFound);
    }

    let sql = format!(
        "INSERT INTO investments
             (portfolio_id, name, description, start_date, amount, investment_type,
              ticker_symbol, shares, has_distributions)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) {}",
        INVESTMENT_RETURNING
    );
    let investment = sqlx::query_as::<_, Investment>(&sql)
        .bind(payload.portfolio_id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.start_date)
        .bind(payload.amount)
        .bind(&payload.investment_type)
        .bind(&payload.ticker_symbol)
        .bind(payload.shares)
        .bind(payload.has_distributions)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from)?;

    for category_id in &payload.category_ids {
        let result = sqlx::query(
            "INSERT INTO investment_categories (investment_id, category_id)
             SELECT $1, c.id FROM categories c WHERE c.id = $2 AND c.user_id = $3
             ON CONFLICT DO NOTHING",
        )
        .bind(investment.id)
        .bind(category_id)
        .bind(store.user_id())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            // Foreign or nonexistent category: the whole unit rolls back
            return Err(DomainError::CrossTenantAssociation);
        }
    }

    for tag_id in &payload.tag_ids {
        let result = sqlx::query(
            "INSERT INTO investment_tags (investment_id, tag_id)
             SELECT $1, t.id FROM tags t WHERE t.id = $2 AND t.user_id = $3
             ON CONFLICT DO NOTHING",
        )
        .bind(investment.id)
        .bind(tag_id)
        .bind(store.user_id())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::CrossTenantAssociation);
        }
    }

    tx.commit().await.map_err(StoreError::from)?;
    Ok(investment)
}

pub async fn list(
    store: &ScopedStore,
    portfolio_id: Option<i64>,
) -> Result<Vec<InvestmentDetail>, DomainError> {
    let mut conn = store.conn().await?;

    let investments = match portfolio_id {
        Some(pid) => {
            let sql = format!("{} AND i.portfolio_id = $2 ORDER BY i.name", DETAIL_SELECT);
            sqlx::query_as::<_, InvestmentDetail>(&sql)
                .bind(store.user_id())
                .bind(pid)
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            let sql = format!("{} ORDER BY i.name", DETAIL_SELECT);
            sqlx::query_as::<_, InvestmentDetail>(&sql)
                .bind(store.user_id())
                .fetch_all(&mut *conn)
                .await
        }
    }
    .map_err(StoreError::from)?;

    Ok(investments)
}

pub async fn get(store: &ScopedStore, id: i64) -> Result<InvestmentDetail, DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!("{} AND i.id = $2", DETAIL_SELECT);
    sqlx::query_as::<_, InvestmentDetail>(&sql)
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
    payload: UpdateInvestment,
) -> Result<Investment, DomainError> {
    if matches!(payload.amount, Some(a) if a < Decimal::ZERO) {
        return Err(DomainError::NegativeAmount("amount"));
    }

    let mut tx = store.begin().await?;

    // Moving to another portfolio requires that portfolio to be owned too
    if let Some(target) = payload.portfolio_id {
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT id FROM portfolios WHERE id = $2 AND user_id = $1")
                .bind(store.user_id())
                .bind(target)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        if owned.is_none() {
            return Err(DomainError::NotFound);
        }
    }

    let sql = format!(
        "UPDATE investments
         SET portfolio_id = COALESCE($3, portfolio_id),
             name = COALESCE($4, name),
             description = COALESCE($5, description),
             start_date = COALESCE($6, start_date),
             amount = COALESCE($7, amount),
             investment_type = COALESCE($8, investment_type),
             ticker_symbol = COALESCE($9, ticker_symbol),
             shares = COALESCE($10, shares),
             has_distributions = COALESCE($11, has_distributions)
         WHERE id = $2
           AND portfolio_id IN (SELECT id FROM portfolios WHERE user_id = $1) {}",
        INVESTMENT_RETURNING
    );
    let investment = sqlx::query_as::<_, Investment>(&sql)
        .bind(store.user_id())
        .bind(id)
        .bind(payload.portfolio_id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.start_date)
        .bind(payload.amount)
        .bind(&payload.investment_type)
        .bind(&payload.ticker_symbol)
        .bind(payload.shares)
        .bind(payload.has_distributions)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?
        .ok_or(DomainError::NotFound)?;

    tx.commit().await.map_err(StoreError::from)?;
    Ok(investment)
}

/// Delete an owned investment; child distributions go with it via the
/// cascading foreign key, inside the same statement.
pub async fn delete(store: &ScopedStore, id: i64) -> Result<(), DomainError> {
    let mut conn = store.conn().await?;

    let result = sqlx::query(
        "DELETE FROM investments
         WHERE id = $2
           AND portfolio_id IN (SELECT id FROM portfolios WHERE user_id = $1)",
    )
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

/// Record a fresh quote for an owned, tickered investment. Used by the
/// background price refresh; never touched by user-facing writes.
pub async fn record_price(
    store: &ScopedStore,
    investment_id: i64,
    price: Decimal,
) -> Result<(), DomainError> {
    let mut conn = store.conn().await?;

    sqlx::query(
        "UPDATE investments
         SET current_price = $3, price_updated_at = now()
         WHERE id = $2
           AND ticker_symbol IS NOT NULL
           AND portfolio_id IN (SELECT id FROM portfolios WHERE user_id = $1)",
    )
    .bind(store.user_id())
    .bind(investment_id)
    .bind(price)
    .execute(&mut *conn)
    .await
    .map_err(StoreError::from)?;

    Ok(())
}
