use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{User, UserListQuery, UserSearchQuery};

/// Record the caller's identity claim so others can add them by id.
#[utoipa::path(
    post,
    path = "/users/me",
    tag = "Users",
    responses((status = 200, description = "Caller's stored identity", body = User))
)]
pub async fn register_me(State(state): State<AppState>, auth: AuthUser, headers: HeaderMap) -> AppResult<Json<User>> {
    let user = state.users.register(&auth.identity).await?;

    log_activity(
        &state.event_bus,
        "registered",
        &auth.identity.id,
        &user,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(
        ("skip" = Option<i64>, Query, description = "Rows to skip"),
        ("limit" = Option<i64>, Query, description = "Page size, 1..=200, default 50")
    ),
    responses((status = 200, description = "List users", body = [User]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list(query.skip, query.limit).await?))
}

#[utoipa::path(
    get,
    path = "/users/search",
    tag = "Users",
    params(("name" = String, Query, description = "Case-insensitive name fragment")),
    responses((status = 200, description = "Matching users", body = [User]))
)]
pub async fn search_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<UserSearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.search_by_name(&query.name).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<String>) -> AppResult<Json<User>> {
    Ok(Json(state.users.get(&id).await?))
}
