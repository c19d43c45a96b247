use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{recent_activity, ActivityEntry};
use crate::jwt::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/activity",
    tag = "Activity",
    params(("limit" = Option<i64>, Query, description = "Number of entries, 1..=500, default 100")),
    responses((status = 200, description = "Most recent activity first", body = [ActivityEntry]))
)]
pub async fn list_activity(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=500).contains(&limit) {
        return Err(AppError::invalid_argument("limit", "must be between 1 and 500"));
    }

    Ok(Json(recent_activity(&state.pool, limit).await?))
}
