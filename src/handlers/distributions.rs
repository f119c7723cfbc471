use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::Value;

use super::success;
use crate::db::ScopedStore;
use crate::domain::distributions;
use crate::domain::models::{NewDistribution, UpdateDistribution};
use crate::error::ApiError;

/// GET /api/investments/:id/distributions
pub async fn list(
    Extension(store): Extension<ScopedStore>,
    Path(investment_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let distributions = distributions::list(&store, investment_id).await?;
    Ok(success(distributions))
}

/// POST /api/investments/:id/distributions
pub async fn create(
    Extension(store): Extension<ScopedStore>,
    Path(investment_id): Path<i64>,
    Json(payload): Json<NewDistribution>,
) -> Result<impl IntoResponse, ApiError> {
    let distribution = distributions::create(&store, investment_id, payload).await?;
    Ok((StatusCode::CREATED, success(distribution)))
}

/// PUT /api/distributions/:id
pub async fn update(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDistribution>,
) -> Result<Json<Value>, ApiError> {
    let distribution = distributions::update(&store, id, payload).await?;
    Ok(success(distribution))
}

/// DELETE /api/distributions/:id
pub async fn delete(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    distributions::delete(&store, id).await?;
    Ok(success(Value::Null))
}
