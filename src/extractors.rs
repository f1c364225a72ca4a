use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::session::SESSION_COOKIE;
use crate::auth::RequestContext;
use crate::db::models::User;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub context: Arc<RequestContext>,
}

/// Extractor that requires authentication.
/// Fails with `AuthenticationFailed` when there is no valid session.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let context = request_context(parts);
        let user = state.identities.get_by_session(&context).await?;
        Ok(CurrentUser { user, context })
    }
}

/// The request's context whether or not it carries a valid session.
pub struct Session(pub Arc<RequestContext>);

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session(request_context(parts)))
    }
}

/// One context per request, shared by every extractor that asks for it.
fn request_context(parts: &mut Parts) -> Arc<RequestContext> {
    if let Some(context) = parts.extensions.get::<Arc<RequestContext>>() {
        return context.clone();
    }
    let token = extract_session_token(parts).map(str::to_string);
    let context = Arc::new(RequestContext::new(token));
    parts.extensions.insert(context.clone());
    context
}

fn extract_session_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == SESSION_COOKIE && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
