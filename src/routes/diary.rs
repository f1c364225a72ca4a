use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::profile::owner_by_account;
use crate::state::AppState;

const LISTING_LIMIT: u32 = 20;

#[derive(Deserialize)]
pub struct EntryForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Any non-empty value marks the entry private
    #[serde(default)]
    pub private: String,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub comment: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/diary/entries/{account_name}", get(list_entries))
        .route("/diary/entry", post(post_entry))
        .route("/diary/entry/{entry_id}", get(show_entry))
        .route("/diary/comment/{entry_id}", post(post_comment))
}

/// GET /diary/entries/{account_name}
async fn list_entries(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(account_name): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = current.user.id;
    let owner = owner_by_account(&state, &account_name).await?;
    let entries = state
        .diary
        .summaries_of(viewer, owner.id, LISTING_LIMIT)
        .await?;

    state.footprints.record_visit(viewer, owner.id).await?;

    Ok(Json(json!({
        "myself": viewer == owner.id,
        "owner": owner,
        "entries": entries,
    })))
}

/// POST /diary/entry
async fn post_entry(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<EntryForm>,
) -> AppResult<Response> {
    let private = !form.private.is_empty();
    state
        .diary
        .post_entry(current.user.id, &form.title, &form.content, private)
        .await?;
    Ok(Redirect::to(&format!("/diary/entries/{}", current.user.account_name)).into_response())
}

/// GET /diary/entry/{entry_id}
async fn show_entry(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(entry_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let viewer = current.user.id;
    let view = state.diary.entry(viewer, entry_id).await?;
    let owner = state.identities.get(view.entry.user_id).await?;

    state.footprints.record_visit(viewer, owner.id).await?;

    Ok(Json(json!({
        "owner": owner,
        "entry": view.entry,
        "comments": view.comments,
    })))
}

/// POST /diary/comment/{entry_id}
async fn post_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(entry_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    state
        .diary
        .post_comment(current.user.id, entry_id, &form.comment)
        .await?;
    Ok(Redirect::to(&format!("/diary/entry/{}", entry_id)).into_response())
}
