use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/cache/snapshot", post(snapshot))
        .route("/admin/cache/load", post(load))
        .route("/admin/initialize", post(initialize))
}

/// POST /admin/cache/snapshot — warm the hot set and persist the cache
async fn snapshot(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let saved = state
        .snapshots
        .snapshot(&state.config.snapshot_path())
        .await?;
    Ok(Json(json!({ "saved": saved })))
}

/// POST /admin/cache/load — replace the cache with the saved snapshot
async fn load(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let loaded = state.snapshots.warm(&state.config.snapshot_path()).await?;
    Ok(Json(json!({ "loaded": loaded })))
}

/// POST /admin/initialize — truncate to the configured watermarks, then reload the cache
async fn initialize(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state
        .store
        .reset_to_watermarks(state.config.reset.watermarks())
        .await?;
    // Cached friendships may refer to deleted relations
    state.friends.clear();
    let loaded = state.warm_or_empty().await;
    Ok(Json(json!({ "loaded": loaded })))
}
