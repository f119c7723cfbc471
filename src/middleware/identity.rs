use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the request identity and binds it to a scoped store.
///
/// Runs on every tenant-scoped route: consults the schema manager (no-op
/// after first success), resolves the identity through the configured
/// strategy, and injects a [`crate::db::ScopedStore`] extension so
/// handlers can only reach storage through the bound identity.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state
        .schema
        .ensure_ready(state.store.pool())
        .await?;

    let identity = state.resolver.resolve(request.headers()).await?;
    let scoped = state.store.scoped(identity);

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(scoped);

    Ok(next.run(request).await)
}
