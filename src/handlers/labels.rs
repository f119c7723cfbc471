//! Handlers for the three user-scoped label collections and the
//! investment association endpoints. Each collection gets thin wrappers
//! over the shared label operations so the router stays explicit.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::Value;

use super::success;
use crate::db::ScopedStore;
use crate::domain::labels::{self, AttachKind, LabelKind};
use crate::domain::models::NewLabel;
use crate::error::ApiError;

async fn list(store: ScopedStore, kind: LabelKind) -> Result<Json<Value>, ApiError> {
    let rows = labels::list(&store, kind).await?;
    Ok(success(rows))
}

async fn create(
    store: ScopedStore,
    kind: LabelKind,
    payload: NewLabel,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let label = labels::create(&store, kind, payload).await?;
    Ok((StatusCode::CREATED, success(label)))
}

async fn rename(
    store: ScopedStore,
    kind: LabelKind,
    id: i64,
    payload: NewLabel,
) -> Result<Json<Value>, ApiError> {
    let label = labels::rename(&store, kind, id, payload).await?;
    Ok(success(label))
}

async fn delete(store: ScopedStore, kind: LabelKind, id: i64) -> Result<Json<Value>, ApiError> {
    labels::delete(&store, kind, id).await?;
    Ok(success(Value::Null))
}

// --- categories ---

pub async fn categories_list(
    Extension(store): Extension<ScopedStore>,
) -> Result<Json<Value>, ApiError> {
    list(store, LabelKind::Category).await
}

pub async fn categories_create(
    Extension(store): Extension<ScopedStore>,
    Json(payload): Json<NewLabel>,
) -> Result<impl IntoResponse, ApiError> {
    create(store, LabelKind::Category, payload).await
}

pub async fn categories_rename(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<NewLabel>,
) -> Result<Json<Value>, ApiError> {
    rename(store, LabelKind::Category, id, payload).await
}

pub async fn categories_delete(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    delete(store, LabelKind::Category, id).await
}

// --- tags ---

pub async fn tags_list(Extension(store): Extension<ScopedStore>) -> Result<Json<Value>, ApiError> {
    list(store, LabelKind::Tag).await
}

pub async fn tags_create(
    Extension(store): Extension<ScopedStore>,
    Json(payload): Json<NewLabel>,
) -> Result<impl IntoResponse, ApiError> {
    create(store, LabelKind::Tag, payload).await
}

pub async fn tags_rename(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<NewLabel>,
) -> Result<Json<Value>, ApiError> {
    rename(store, LabelKind::Tag, id, payload).await
}

pub async fn tags_delete(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    delete(store, LabelKind::Tag, id).await
}

// --- investment types ---

pub async fn types_list(Extension(store): Extension<ScopedStore>) -> Result<Json<Value>, ApiError> {
    list(store, LabelKind::InvestmentType).await
}

pub async fn types_create(
    Extension(store): Extension<ScopedStore>,
    Json(payload): Json<NewLabel>,
) -> Result<impl IntoResponse, ApiError> {
    create(store, LabelKind::InvestmentType, payload).await
}

pub async fn types_rename(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<NewLabel>,
) -> Result<Json<Value>, ApiError> {
    rename(store, LabelKind::InvestmentType, id, payload).await
}

pub async fn types_delete(
    Extension(store): Extension<ScopedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    delete(store, LabelKind::InvestmentType, id).await
}

// --- associations ---

/// PUT /api/investments/:id/categories/:category_id
pub async fn associate_category(
    Extension(store): Extension<ScopedStore>,
    Path((investment_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    labels::associate(&store, AttachKind::Category, investment_id, category_id).await?;
    Ok(success(Value::Null))
}

/// DELETE /api/investments/:id/categories/:category_id
pub async fn dissociate_category(
    Extension(store): Extension<ScopedStore>,
    Path((investment_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    labels::dissociate(&store, AttachKind::Category, investment_id, category_id).await?;
    Ok(success(Value::Null))
}

/// PUT /api/investments/:id/tags/:tag_id
pub async fn associate_tag(
    Extension(store): Extension<ScopedStore>,
    Path((investment_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    labels::associate(&store, AttachKind::Tag, investment_id, tag_id).await?;
    Ok(success(Value::Null))
}

/// DELETE /api/investments/:id/tags/:tag_id
pub async fn dissociate_tag(
    Extension(store): Extension<ScopedStore>,
    Path((investment_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    labels::dissociate(&store, AttachKind::Tag, investment_id, tag_id).await?;
    Ok(success(Value::Null))
}
