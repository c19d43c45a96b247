use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::actions;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::extract::ValidatedJson;
use crate::jwt::AuthUser;
use crate::models::access::{AccessLevel, GroupRole};
use crate::models::group::{
    Group, GroupAccess, GroupAddMemberRequest, GroupCreateRequest, GroupGrantRequest,
    GroupMembershipChange, GroupUpdateRequest,
};
use crate::models::IdsRequest;
use crate::services::{ResourceChanges, ResourceDraft};

fn membership_change(group_id: Uuid, user_id: &str, role: Option<GroupRole>) -> GroupMembershipChange {
    GroupMembershipChange {
        group_id,
        user_id: user_id.to_string(),
        role,
    }
}

#[utoipa::path(
    get,
    path = "/groups",
    tag = "Groups",
    responses((status = 200, description = "List groups", body = [Group]))
)]
pub async fn list_groups(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Group>>> {
    let groups = state.groups.list().await?;
    Ok(Json(groups.into_iter().map(Group::from).collect()))
}

#[utoipa::path(
    get,
    path = "/groups/names",
    tag = "Groups",
    responses((status = 200, description = "Names of all groups", body = [String]))
)]
pub async fn list_group_names(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.groups.list_names().await?))
}

#[utoipa::path(
    get,
    path = "/groups/mine",
    tag = "Groups",
    responses((status = 200, description = "Groups the caller is a member of", body = [Group]))
)]
pub async fn list_my_groups(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Group>>> {
    let groups = state.groups.list_for(&auth.identity.id).await?;
    Ok(Json(groups.into_iter().map(Group::from).collect()))
}

#[utoipa::path(
    post,
    path = "/groups/batch",
    tag = "Groups",
    request_body = IdsRequest,
    responses(
        (status = 200, description = "Groups with the given ids", body = [Group]),
        (status = 400, description = "Empty id list")
    )
)]
pub async fn get_groups_by_ids(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(req): ValidatedJson<IdsRequest>,
) -> AppResult<Json<Vec<Group>>> {
    let groups = state.groups.get_many(&req.ids).await?;
    Ok(Json(groups.into_iter().map(Group::from).collect()))
}

#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group detail", body = Group),
        (status = 404, description = "Group not found")
    )
)]
pub async fn get_group(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Group>> {
    Ok(Json(state.groups.get(id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "Groups",
    request_body = GroupCreateRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 400, description = "Missing name")
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GroupCreateRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    let draft = ResourceDraft {
        name: req.name,
        description: req.description,
    };
    let group = Group::from(state.groups.create(draft, &auth.identity).await?);

    log_activity(
        &state.event_bus,
        "created",
        &auth.identity.id,
        &group,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    put,
    path = "/groups/{id}",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = GroupUpdateRequest,
    responses(
        (status = 200, description = "Group updated", body = Group),
        (status = 403, description = "Caller is not ADMIN"),
        (status = 404, description = "Group or membership not found")
    )
)]
pub async fn update_group(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<GroupUpdateRequest>,
) -> AppResult<Json<Group>> {
    let changes = ResourceChanges {
        name: req.name,
        description: req.description,
    };
    let group = Group::from(state.groups.update(&auth.identity, id, changes).await?);

    log_activity(
        &state.event_bus,
        "updated",
        &auth.identity.id,
        &group,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(group))
}

#[utoipa::path(
    get,
    path = "/groups/{id}/access",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Caller's role", body = GroupAccess),
        (status = 404, description = "Group or membership not found")
    )
)]
pub async fn my_access(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<GroupAccess>> {
    let role = state.groups.access_level_of(id, &auth.identity.id).await?;
    Ok(Json(GroupAccess {
        group_id: id,
        user_id: auth.identity.id,
        role,
    }))
}

/// Members may look up the role of any other member.
#[utoipa::path(
    get,
    path = "/groups/{id}/access/{user_id}",
    tag = "Groups",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Member id")
    ),
    responses(
        (status = 200, description = "Member's role", body = GroupAccess),
        (status = 404, description = "Group or membership not found")
    )
)]
pub async fn user_access(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, String)>,
) -> AppResult<Json<GroupAccess>> {
    state
        .groups
        .engine()
        .authorize(actions::VIEW_ACCESS, id, &auth.identity.id, GroupRole::LOWEST)
        .await?;
    let role = state.groups.access_level_of(id, &user_id).await?;

    Ok(Json(GroupAccess {
        group_id: id,
        user_id,
        role,
    }))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/join-requests",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 204, description = "Join request recorded"),
        (status = 409, description = "Caller is already a member")
    )
)]
pub async fn request_join(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.groups.request_join(&auth.identity, id).await?;

    log_activity(
        &state.event_bus,
        "join_requested",
        &auth.identity.id,
        &membership_change(id, &auth.identity.id, None),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/join-requests",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group id")),
    responses((status = 204, description = "Join request withdrawn"))
)]
pub async fn cancel_join_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.groups.cancel_join_request(&auth.identity, id).await?;

    log_activity(
        &state.event_bus,
        "join_cancelled",
        &auth.identity.id,
        &membership_change(id, &auth.identity.id, None),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/groups/{id}/join-requests/{user_id}",
    tag = "Groups",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Applicant id")
    ),
    request_body = GroupGrantRequest,
    responses(
        (status = 200, description = "Applicant admitted", body = GroupAccess),
        (status = 403, description = "Caller is not ADMIN"),
        (status = 404, description = "No pending request or unknown user")
    )
)]
pub async fn accept_join_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
    ValidatedJson(req): ValidatedJson<GroupGrantRequest>,
) -> AppResult<Json<GroupAccess>> {
    let role = state
        .groups
        .accept_join_request(&auth.identity, &user_id, id, req.role)
        .await?;

    log_activity(
        &state.event_bus,
        "join_accepted",
        &auth.identity.id,
        &membership_change(id, &user_id, Some(role)),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(GroupAccess {
        group_id: id,
        user_id,
        role,
    }))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/join-requests/{user_id}",
    tag = "Groups",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Applicant id")
    ),
    responses(
        (status = 204, description = "Join request rejected"),
        (status = 403, description = "Caller is not ADMIN")
    )
)]
pub async fn reject_join_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    state.groups.reject_join_request(&auth.identity, &user_id, id).await?;

    log_activity(
        &state.event_bus,
        "join_rejected",
        &auth.identity.id,
        &membership_change(id, &user_id, None),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/groups/{id}/members",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = GroupAddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = GroupAccess),
        (status = 403, description = "Caller is not ADMIN"),
        (status = 409, description = "Already a member")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<GroupAddMemberRequest>,
) -> AppResult<(StatusCode, Json<GroupAccess>)> {
    let role = state
        .groups
        .add_member(&auth.identity, &req.user_id, id, req.role)
        .await?;

    log_activity(
        &state.event_bus,
        "member_added",
        &auth.identity.id,
        &membership_change(id, &req.user_id, Some(role)),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((
        StatusCode::CREATED,
        Json(GroupAccess {
            group_id: id,
            user_id: req.user_id,
            role,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/groups/{id}/members/{user_id}",
    tag = "Groups",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Member id")
    ),
    request_body = GroupGrantRequest,
    responses(
        (status = 200, description = "Role changed", body = GroupAccess),
        (status = 404, description = "Not a member")
    )
)]
pub async fn change_member_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
    ValidatedJson(req): ValidatedJson<GroupGrantRequest>,
) -> AppResult<Json<GroupAccess>> {
    let role = req.role.ok_or_else(|| AppError::missing_argument("role"))?;
    state
        .groups
        .change_member_level(&auth.identity, &user_id, id, role)
        .await?;

    log_activity(
        &state.event_bus,
        "member_level_changed",
        &auth.identity.id,
        &membership_change(id, &user_id, Some(role)),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(GroupAccess {
        group_id: id,
        user_id,
        role,
    }))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/members/{user_id}",
    tag = "Groups",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Member id, or the caller's own id to leave")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Removing someone else requires ADMIN")
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    state.groups.remove_or_leave(&auth.identity, &user_id, id).await?;

    let action = if user_id == auth.identity.id { "member_left" } else { "member_removed" };
    log_activity(
        &state.event_bus,
        action,
        &auth.identity.id,
        &membership_change(id, &user_id, None),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
