use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use crate::db::models::{ProfileUpdate, User};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::store::{IdentityStore, SortOrder};

const PROFILE_ENTRIES_LIMIT: u32 = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/profile/{account_name}", get(show).post(update))
}

/// Look up a user by account name, or `ContentNotFound`.
pub(crate) async fn owner_by_account(state: &AppState, account_name: &str) -> AppResult<User> {
    state
        .store
        .user_by_account_name(account_name)
        .await?
        .ok_or(AppError::ContentNotFound)
}

/// GET /profile/{account_name}
async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(account_name): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = current.user.id;
    let owner = owner_by_account(&state, &account_name).await?;
    let profile = state.store.profile(owner.id).await?;
    let visibility = state.guard.visibility(viewer, owner.id).await?;
    let entries = state
        .diary
        .entries_with(owner.id, visibility, SortOrder::OldestFirst, PROFILE_ENTRIES_LIMIT)
        .await?;

    state.footprints.record_visit(viewer, owner.id).await?;

    Ok(Json(json!({
        "owner": owner,
        "profile": profile,
        "entries": entries,
        "private": visibility.includes_private(),
    })))
}

/// POST /profile/{account_name} — only the owner may edit
async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(account_name): Path<String>,
    Form(form): Form<ProfileUpdate>,
) -> AppResult<Response> {
    if account_name != current.user.account_name {
        return Err(AppError::PermissionDenied);
    }
    state.store.update_profile(current.user.id, form).await?;
    Ok(Redirect::to(&format!("/profile/{}", account_name)).into_response())
}
