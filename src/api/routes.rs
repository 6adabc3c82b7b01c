use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::api_error::APIError;
use crate::api::model::{LookupResult, ServerInfo};
use crate::api::server::AppState;

/// Cache partition used by console lookups, kept apart from transport
/// queries so poking at the console cannot warm the serving cache.
const CONSOLE_ISOLATION: &str = "console";

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/info", get(info))
        .route("/lookup", get(lookup))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

#[allow(clippy::unused_async)]
async fn info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        version: env!("CARGO_PKG_VERSION"),
        anchor: state.config.anchor.clone(),
        ready: state.backend.is_ready(),
        cache_entries: state.backend.cache_entries(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

#[derive(Deserialize, Debug)]
struct LookupParams {
    name: String,
}

async fn lookup(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupResult>, APIError> {
    let records = state
        .backend
        .lookup(&params.name, CONSOLE_ISOLATION)
        .await
        .map_err(APIError::from)?;
    Ok(Json(LookupResult {
        name: params.name,
        records: records.iter().map(ToString::to_string).collect(),
    }))
}
