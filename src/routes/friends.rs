use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::db::models::{Footprint, Friend};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::profile::owner_by_account;
use crate::state::AppState;

const FOOTPRINTS_PAGE_LIMIT: u32 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/footprints", get(footprints))
        .route("/friends", get(friends))
        .route("/friends/{account_name}", post(befriend))
}

/// GET /footprints — who visited me lately
async fn footprints(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<Footprint>>> {
    let prints = state
        .footprints
        .recent_for(current.user.id, FOOTPRINTS_PAGE_LIMIT)
        .await?;
    Ok(Json(prints))
}

/// GET /friends
async fn friends(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<Friend>>> {
    Ok(Json(state.timeline.friends(current.user.id).await?))
}

/// POST /friends/{account_name} — befriend, idempotently
async fn befriend(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(account_name): Path<String>,
) -> AppResult<Response> {
    let another = owner_by_account(&state, &account_name).await?;
    state
        .friends
        .create_friendship(current.user.id, another.id)
        .await?;
    Ok(Redirect::to("/friends").into_response())
}
