pub mod admin;
pub mod auth;
pub mod diary;
pub mod friends;
pub mod home;
pub mod profile;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router with its state attached.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(auth::router())
        .merge(profile::router())
        .merge(diary::router())
        .merge(friends::router())
        .merge(admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
