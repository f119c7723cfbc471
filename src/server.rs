use axum::{middleware, routing::get, routing::post, routing::put, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::handlers::{distributions, investments, labels, portfolios, snapshots};
use crate::middleware::identity_middleware;
use crate::state::AppState;

/// Start the HTTP server and serve until shutdown
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let port = config.api.port;
    let state = AppState::from_config(config)?;
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("folio-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/portfolios",
            get(portfolios::list).post(portfolios::create),
        )
        .route(
            "/portfolios/:id",
            get(portfolios::get)
                .put(portfolios::update)
                .delete(portfolios::delete),
        )
        .route(
            "/investments",
            get(investments::list).post(investments::create),
        )
        .route(
            "/investments/:id",
            get(investments::get)
                .put(investments::update)
                .delete(investments::delete),
        )
        .route(
            "/investments/:id/distributions",
            get(distributions::list).post(distributions::create),
        )
        .route(
            "/distributions/:id",
            put(distributions::update).delete(distributions::delete),
        )
        .route(
            "/categories",
            get(labels::categories_list).post(labels::categories_create),
        )
        .route(
            "/categories/:id",
            put(labels::categories_rename).delete(labels::categories_delete),
        )
        .route("/tags", get(labels::tags_list).post(labels::tags_create))
        .route(
            "/tags/:id",
            put(labels::tags_rename).delete(labels::tags_delete),
        )
        .route(
            "/investment-types",
            get(labels::types_list).post(labels::types_create),
        )
        .route(
            "/investment-types/:id",
            put(labels::types_rename).delete(labels::types_delete),
        )
        .route(
            "/investments/:id/categories/:category_id",
            put(labels::associate_category).delete(labels::dissociate_category),
        )
        .route(
            "/investments/:id/tags/:tag_id",
            put(labels::associate_tag).delete(labels::dissociate_tag),
        )
        .route(
            "/snapshots/portfolios/:id",
            get(snapshots::portfolio_history),
        )
        .route(
            "/snapshots/investments/:id",
            get(snapshots::investment_history),
        )
        .route("/snapshots/user", get(snapshots::user_history))
        .route("/snapshots/run", post(snapshots::run))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api);

    if state.config.api.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Folio API",
            "version": version,
            "description": "Multi-tenant personal finance tracker backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "portfolios": "/api/portfolios[/:id]",
                "investments": "/api/investments[/:id]",
                "distributions": "/api/investments/:id/distributions, /api/distributions/:id",
                "labels": "/api/categories, /api/tags, /api/investment-types",
                "snapshots": "/api/snapshots/portfolios/:id, /api/snapshots/investments/:id, /api/snapshots/user, /api/snapshots/run",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
