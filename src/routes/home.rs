use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::timeline::TimelineView;

/// GET / — the signed-in user's home timeline
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<TimelineView>> {
    let view = state.timeline.build_home_timeline(current.user.id).await?;
    Ok(Json(view))
}
