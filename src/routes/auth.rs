use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::{credentials, session};
use crate::error::AppResult;
use crate::extractors::Session;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
}

/// POST /login — verify credentials and start a session
async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let user = credentials::authenticate(&state.store, &form.email, &form.password).await?;
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.store, user.id, hours).await?;
    tracing::info!("User {} logged in", user.account_name);
    state.identities.insert(user);

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::session_cookie(&token, hours))]),
        Redirect::to("/"),
    )
        .into_response())
}

/// GET /logout — forget the session on both ends
async fn logout(State(state): State<AppState>, Session(context): Session) -> AppResult<Response> {
    if let Some(token) = context.token() {
        session::delete_session(&state.store, token).await?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::clear_session_cookie())]),
        Redirect::to("/login"),
    )
        .into_response())
}
