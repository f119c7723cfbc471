use axum::{extract::Path, response::Json, Extension};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::success;
use crate::db::ScopedStore;
use crate::domain::snapshots;
use crate::error::ApiError;

/// GET /api/snapshots/portfolios/:id
pub async fn portfolio_history(
    Extension(store): Extension<ScopedStore>,
    Path(portfolio_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let history = snapshots::list_portfolio(&store, portfolio_id).await?;
    Ok(success(history))
}

/// GET /api/snapshots/investments/:id
pub async fn investment_history(
    Extension(store): Extension<ScopedStore>,
    Path(investment_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let history = snapshots::list_investment(&store, investment_id).await?;
    Ok(success(history))
}

/// GET /api/snapshots/user
pub async fn user_history(
    Extension(store): Extension<ScopedStore>,
) -> Result<Json<Value>, ApiError> {
    let history = snapshots::list_user(&store).await?;
    Ok(success(history))
}

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    pub date: Option<NaiveDate>,
}

/// POST /api/snapshots/run - batch compute for every owned portfolio and
/// the user-level row; defaults to today
pub async fn run(
    Extension(store): Extension<ScopedStore>,
    payload: Option<Json<RunRequest>>,
) -> Result<Json<Value>, ApiError> {
    let date = payload
        .and_then(|Json(r)| r.date)
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let outcome = snapshots::run_for_date(&store, date).await?;
    Ok(success(outcome))
}
