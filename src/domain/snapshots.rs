//! Dated aggregate snapshots of value, principal and distributions at the
//! investment, portfolio and user level. One row per (owner, date),
//! upserted idempotently; re-running a date replaces the computed fields.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Postgres, Transaction};

use crate::db::{ScopedStore, StoreError};
use crate::domain::models::{InvestmentSnapshot, PortfolioSnapshot, UserSnapshot};
use crate::domain::DomainError;

/// Per-investment inputs to a snapshot computation
#[derive(Debug, sqlx::FromRow)]
struct InvestmentFigures {
    id: i64,
    amount: Decimal,
    shares: Option<Decimal>,
    current_price: Option<Decimal>,
    total_distributions: Decimal,
}

const FIGURES_SELECT: &str = "
    SELECT i.id, i.amount, i.shares, i.current_price,
           COALESCE(d.total, 0) AS total_distributions
    FROM investments i
    JOIN portfolios p ON p.id = i.portfolio_id
    LEFT JOIN (SELECT investment_id, SUM(amount) AS total
               FROM distributions GROUP BY investment_id) d
           ON d.investment_id = i.id
    WHERE p.user_id = $1
";

/// Market value for a priced instrument, principal otherwise
fn current_value(amount: Decimal, shares: Option<Decimal>, price: Option<Decimal>) -> Decimal {
    match (shares, price) {
        (Some(shares), Some(price)) => shares * price,
        _ => amount,
    }
}

#[derive(Debug, Default, PartialEq)]
struct Totals {
    total_value: Decimal,
    total_invested: Decimal,
    total_distributions: Decimal,
    investment_count: i64,
}

fn aggregate(figures: &[InvestmentFigures]) -> Totals {
    figures.iter().fold(Totals::default(), |mut acc, f| {
        acc.total_value += current_value(f.amount, f.shares, f.current_price);
        acc.total_invested += f.amount;
        acc.total_distributions += f.total_distributions;
        acc.investment_count += 1;
        acc
    })
}

/// Outcome of a batch snapshot run
#[derive(Debug, Serialize)]
pub struct SnapshotRun {
    pub snapshot_date: NaiveDate,
    pub portfolios: usize,
    pub investments: usize,
}

/// Compute and upsert the snapshot for one owned portfolio, including a
/// per-investment row for each of its holdings, in one transaction.
pub async fn snapshot_portfolio(
    store: &ScopedStore,
    portfolio_id: i64,
    date: NaiveDate,
) -> Result<PortfolioSnapshot, DomainError> {
    let mut tx = store.begin().await?;

    let owned: Option<i64> =
        sqlx::query_scalar("SELECT id FROM portfolios WHERE id = $2 AND user_id = $1")
            .bind(store.user_id())
            .bind(portfolio_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?;
    if owned.is_none() {
        return Err(DomainError::NotFound);
    }

    let snapshot = snapshot_portfolio_in_tx(&mut tx, store.user_id(), portfolio_id, date).await?;
    tx.commit().await.map_err(StoreError::from)?;
    Ok(snapshot)
}

async fn snapshot_portfolio_in_tx(
    tx: &mut Transaction<'static, Postgres>,
    user_id: i64,
    portfolio_id: i64,
    date: NaiveDate,
) -> Result<PortfolioSnapshot, DomainError> {
    let sql = format!("{} AND i.portfolio_id = $2", FIGURES_SELECT);
    let figures = sqlx::query_as::<_, InvestmentFigures>(&sql)
        .bind(user_id)
        .bind(portfolio_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(StoreError::from)?;

    for f in &figures {
        sqlx::query(
            "INSERT INTO investment_snapshots
                 (investment_id, snapshot_date, total_value, total_invested, total_distributions)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (investment_id, snapshot_date) DO UPDATE
             SET total_value = EXCLUDED.total_value,
                 total_invested = EXCLUDED.total_invested,
                 total_distributions = EXCLUDED.total_distributions",
        )
        .bind(f.id)
        .bind(date)
        .bind(current_value(f.amount, f.shares, f.current_price))
        .bind(f.amount)
        .bind(f.total_distributions)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from)?;
    }

    let totals = aggregate(&figures);
    let snapshot = sqlx::query_as::<_, PortfolioSnapshot>(
        "INSERT INTO portfolio_snapshots
             (portfolio_id, snapshot_date, total_value, total_invested,
              total_distributions, investment_count)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (portfolio_id, snapshot_date) DO UPDATE
         SET total_value = EXCLUDED.total_value,
             total_invested = EXCLUDED.total_invested,
             total_distributions = EXCLUDED.total_distributions,
             investment_count = EXCLUDED.investment_count
         RETURNING id, portfolio_id, snapshot_date, total_value, total_invested,
                   total_distributions, investment_count, created_at",
    )
    .bind(portfolio_id)
    .bind(date)
    .bind(totals.total_value)
    .bind(totals.total_invested)
    .bind(totals.total_distributions)
    .bind(totals.investment_count)
    .fetch_one(&mut **tx)
    .await
    .map_err(StoreError::from)?;

    Ok(snapshot)
}

/// Compute and upsert the user-level snapshot across every portfolio
pub async fn snapshot_user(
    store: &ScopedStore,
    date: NaiveDate,
) -> Result<UserSnapshot, DomainError> {
    let mut tx = store.begin().await?;
    let snapshot = snapshot_user_in_tx(&mut tx, store.user_id(), date).await?;
    tx.commit().await.map_err(StoreError::from)?;
    Ok(snapshot)
}

async fn snapshot_user_in_tx(
    tx: &mut Transaction<'static, Postgres>,
    user_id: i64,
    date: NaiveDate,
) -> Result<UserSnapshot, DomainError> {
    let figures = sqlx::query_as::<_, InvestmentFigures>(FIGURES_SELECT)
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(StoreError::from)?;
    let totals = aggregate(&figures);

    let snapshot = sqlx::query_as::<_, UserSnapshot>(
        "INSERT INTO user_snapshots
             (user_id, snapshot_date, total_value, total_invested,
              total_distributions, investment_count)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (user_id, snapshot_date) DO UPDATE
         SET total_value = EXCLUDED.total_value,
             total_invested = EXCLUDED.total_invested,
             total_distributions = EXCLUDED.total_distributions,
             investment_count = EXCLUDED.investment_count
         RETURNING id, user_id, snapshot_date, total_value, total_invested,
                   total_distributions, investment_count, created_at",
    )
    .bind(user_id)
    .bind(date)
    .bind(totals.total_value)
    .bind(totals.total_invested)
    .bind(totals.total_distributions)
    .bind(totals.investment_count)
    .fetch_one(&mut **tx)
    .await
    .map_err(StoreError::from)?;

    Ok(snapshot)
}

/// Batch variant: snapshot every owned portfolio and the user-level row
/// for one date, in a single transaction so a partial failure leaves no
/// mixed-date state behind.
pub async fn run_for_date(store: &ScopedStore, date: NaiveDate) -> Result<SnapshotRun, DomainError> {
    let mut tx = store.begin().await?;

    let portfolio_ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM portfolios WHERE user_id = $1 ORDER BY id")
            .bind(store.user_id())
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::from)?;

    let mut investments = 0usize;
    for portfolio_id in &portfolio_ids {
        let snapshot =
            snapshot_portfolio_in_tx(&mut tx, store.user_id(), *portfolio_id, date).await?;
        investments += snapshot.investment_count as usize;
    }
    snapshot_user_in_tx(&mut tx, store.user_id(), date).await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(SnapshotRun {
        snapshot_date: date,
        portfolios: portfolio_ids.len(),
        investments,
    })
}

/// Snapshot history for one owned portfolio, oldest first
pub async fn list_portfolio(
    store: &ScopedStore,
    portfolio_id: i64,
) -> Result<Vec<PortfolioSnapshot>, DomainError> {
    let mut conn = store.conn().await?;

    let owned: Option<i64> =
        sqlx::query_scalar("SELECT id FROM portfolios WHERE id = $2 AND user_id = $1")
            .bind(store.user_id())
            .bind(portfolio_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::from)?;
    if owned.is_none() {
        return Err(DomainError::NotFound);
    }

    let snapshots = sqlx::query_as::<_, PortfolioSnapshot>(
        "SELECT s.id, s.portfolio_id, s.snapshot_date, s.total_value, s.total_invested,
                s.total_distributions, s.investment_count, s.created_at
         FROM portfolio_snapshots s
         JOIN portfolios p ON p.id = s.portfolio_id
         WHERE p.user_id = $1 AND s.portfolio_id = $2
         ORDER BY s.snapshot_date",
    )
    .bind(store.user_id())
    .bind(portfolio_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::from)?;

    Ok(snapshots)
}

/// Snapshot history for one owned investment, oldest first
pub async fn list_investment(
    store: &ScopedStore,
    investment_id: i64,
) -> Result<Vec<InvestmentSnapshot>, DomainError> {
    let mut conn = store.conn().await?;

    let owned: Option<i64> = sqlx::query_scalar(
        "SELECT i.id FROM investments i
         JOIN portfolios p ON p.id = i.portfolio_id
         WHERE p.user_id = $1 AND i.id = $2",
    )
    .bind(store.user_id())
    .bind(investment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StoreError::from)?;
    if owned.is_none() {
        return Err(DomainError::NotFound);
    }

    let snapshots = sqlx::query_as::<_, InvestmentSnapshot>(
        "SELECT s.id, s.investment_id, s.snapshot_date, s.total_value, s.total_invested,
                s.total_distributions, s.created_at
         FROM investment_snapshots s
         JOIN investments i ON i.id = s.investment_id
         JOIN portfolios p ON p.id = i.portfolio_id
         WHERE p.user_id = $1 AND s.investment_id = $2
         ORDER BY s.snapshot_date",
    )
    .bind(store.user_id())
    .bind(investment_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::from)?;

    Ok(snapshots)
}

/// User-level snapshot history, oldest first
pub async fn list_user(store: &ScopedStore) -> Result<Vec<UserSnapshot>, DomainError> {
    let mut conn = store.conn().await?;

    let snapshots = sqlx::query_as::<_, UserSnapshot>(
        "SELECT id, user_id, snapshot_date, total_value, total_invested,
                total_distributions, investment_count, created_at
         FROM user_snapshots
         WHERE user_id = $1
         ORDER BY snapshot_date",
    )
    .bind(store.user_id())
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::from)?;

    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn figures(
        amount: Decimal,
        shares: Option<Decimal>,
        price: Option<Decimal>,
        distributions: Decimal,
    ) -> InvestmentFigures {
        InvestmentFigures {
            id: 0,
            amount,
            shares,
            current_price: price,
            total_distributions: distributions,
        }
    }

    #[test]
    fn unpriced_instruments_are_valued_at_principal() {
        assert_eq!(current_value(dec!(1000), None, None), dec!(1000));
        assert_eq!(current_value(dec!(1000), Some(dec!(5)), None), dec!(1000));
        assert_eq!(current_value(dec!(1000), None, Some(dec!(200))), dec!(1000));
    }

    #[test]
    fn priced_instruments_are_valued_at_market() {
        assert_eq!(
            current_value(dec!(1000), Some(dec!(5)), Some(dec!(210.50))),
            dec!(1052.50)
        );
    }

    #[test]
    fn aggregate_sums_across_holdings() {
        let rows = vec![
            figures(dec!(1000), None, None, dec!(25.50)),
            figures(dec!(500), Some(dec!(10)), Some(dec!(60)), dec!(0)),
        ];
        let totals = aggregate(&rows);
        assert_eq!(totals.total_invested, dec!(1500));
        assert_eq!(totals.total_value, dec!(1600));
        assert_eq!(totals.total_distributions, dec!(25.50));
        assert_eq!(totals.investment_count, 2);
    }

    #[test]
    fn empty_portfolio_aggregates_to_zero() {
        let totals = aggregate(&[]);
        assert_eq!(totals, Totals::default());
    }
}
