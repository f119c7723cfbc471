use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::success;
use crate::db::ScopedStore;
use crate::domain::investments;
use crate::domain::labels::{self, AttachKind};
use crate::domain::models::{NewInvestment, UpdateInvestment};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InvestmentQuery {
    pub portfolio_id: Option<i64>,
}

/// GET /api/investments[?portfolio_id=] - also kicks off a background
/// price refresh for stale quotes; its outcome never affects this
/// response.
pub async fn list(
    State(state): State<AppState>,
    Extension(store): Extension<ScopedStore>,
    Query(query): Query<InvestmentQuery>,
) -> Result<Json<Value>, ApiError> {
    let investments = investments::list(&store, query.portfolio_id).await?;

    state.quotes.spawn_refresh(store);

    Ok(success(investments))
}

/// POST /api/investments - associations in the payload are applied in the
/// same transaction
pub async fn create(
    Extension(store): Extension<ScopedStore>,
    Json(payload): Json<NewInvestment>,
) -> Result<impl IntoResponse, ApiError> {
    let investment = investments::create(&store, payload).await?;
    Ok((StatusCode::CREATED, success(investment)))
}

/// GET /api/investments/:id - includes attached categories and tags
pub async fn get(
    State(state): State<AppState>,
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let investment = investments::get(&store, id).await?;
    let categories = labels::list_for_investment(&store, AttachKind::Category, id).await?;
    let tags = labels::list_for_investment(&store, AttachKind::Tag, id).await?;

    state.quotes.spawn_refresh(store);

    let mut body = serde_json::to_value(&investment)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    body["categories"] = json!(categories);
    body["tags"] = json!(tags);
    Ok(success(body))
}

/// PUT /api/investments/:id
pub async fn update(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateInvestment>,
) -> Result<Json<Value>, ApiError> {
    let investment = investments::update(&store, id, payload).await?;
    Ok(success(investment))
}

/// DELETE /api/investments/:id
pub async fn delete(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    investments::delete(&store, id).await?;
    Ok(success(Value::Null))
}
