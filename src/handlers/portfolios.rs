use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::Value;

use super::success;
use crate::db::ScopedStore;
use crate::domain::models::{NewPortfolio, UpdatePortfolio};
use crate::domain::portfolios;
use crate::error::ApiError;

/// GET /api/portfolios
pub async fn list(Extension(store): Extension<ScopedStore>) -> Result<Json<Value>, ApiError> {
    let portfolios = portfolios::list(&store).await?;
    Ok(success(portfolios))
}

/// POST /api/portfolios
pub async fn create(
    Extension(store): Extension<ScopedStore>,
    Json(payload): Json<NewPortfolio>,
) -> Result<impl IntoResponse, ApiError> {
    let portfolio = portfolios::create(&store, payload).await?;
    Ok((StatusCode::CREATED, success(portfolio)))
}

/// GET /api/portfolios/:id
pub async fn get(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let portfolio = portfolios::get(&store, id).await?;
    Ok(success(portfolio))
}

/// PUT /api/portfolios/:id
pub async fn update(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePortfolio>,
) -> Result<Json<Value>, ApiError> {
    let portfolio = portfolios::update(&store, id, payload).await?;
    Ok(success(portfolio))
}

/// DELETE /api/portfolios/:id - rejected while the portfolio holds
/// investments
pub async fn delete(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    portfolios::delete(&store, id).await?;
    Ok(success(Value::Null))
}
