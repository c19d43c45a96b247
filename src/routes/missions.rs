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
use crate::models::access::{AccessLevel, MissionPermission};
use crate::models::mission::{
    ExportRequest, Mission, MissionAccess, MissionAddMemberRequest, MissionCreateRequest, MissionGrantRequest,
    MissionMembershipChange, MissionUpdateRequest,
};
use crate::models::IdsRequest;
use crate::services::{ResourceChanges, ResourceDraft};

fn membership_change(mission_id: Uuid, user_id: &str, permission: Option<MissionPermission>) -> MissionMembershipChange {
    MissionMembershipChange {
        mission_id,
        user_id: user_id.to_string(),
        permission,
    }
}

#[utoipa::path(
    get,
    path = "/missions",
    tag = "Missions",
    responses((status = 200, description = "List missions", body = [Mission]))
)]
pub async fn list_missions(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Mission>>> {
    let missions = state.missions.list().await?;
    Ok(Json(missions.into_iter().map(Mission::from).collect()))
}

#[utoipa::path(
    get,
    path = "/missions/names",
    tag = "Missions",
    responses((status = 200, description = "Names of all missions", body = [String]))
)]
pub async fn list_mission_names(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.missions.list_names().await?))
}

#[utoipa::path(
    get,
    path = "/missions/mine",
    tag = "Missions",
    responses((status = 200, description = "Missions the caller is a member of", body = [Mission]))
)]
pub async fn list_my_missions(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Mission>>> {
    let missions = state.missions.list_for(&auth.identity.id).await?;
    Ok(Json(missions.into_iter().map(Mission::from).collect()))
}

#[utoipa::path(
    post,
    path = "/missions/batch",
    tag = "Missions",
    request_body = IdsRequest,
    responses(
        (status = 200, description = "Missions with the given ids", body = [Mission]),
        (status = 400, description = "Empty id list")
    )
)]
pub async fn get_missions_by_ids(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(req): ValidatedJson<IdsRequest>,
) -> AppResult<Json<Vec<Mission>>> {
    let missions = state.missions.get_many(&req.ids).await?;
    Ok(Json(missions.into_iter().map(Mission::from).collect()))
}

#[utoipa::path(
    get,
    path = "/missions/{id}",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Mission detail", body = Mission),
        (status = 404, description = "Mission not found")
    )
)]
pub async fn get_mission(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Mission>> {
    Ok(Json(state.missions.get(id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/missions",
    tag = "Missions",
    request_body = MissionCreateRequest,
    responses(
        (status = 201, description = "Mission created", body = Mission),
        (status = 400, description = "Missing name")
    )
)]
pub async fn create_mission(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<MissionCreateRequest>,
) -> AppResult<(StatusCode, Json<Mission>)> {
    let draft = ResourceDraft {
        name: req.name,
        description: req.description,
    };
    let mission = Mission::from(state.missions.create(draft, &auth.identity).await?);

    log_activity(
        &state.event_bus,
        "created",
        &auth.identity.id,
        &mission,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(mission)))
}

#[utoipa::path(
    put,
    path = "/missions/{id}",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
    request_body = MissionUpdateRequest,
    responses(
        (status = 200, description = "Mission updated", body = Mission),
        (status = 403, description = "Caller holds less than WRITE"),
        (status = 404, description = "Mission or membership not found")
    )
)]
pub async fn update_mission(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<MissionUpdateRequest>,
) -> AppResult<Json<Mission>> {
    let changes = ResourceChanges {
        name: req.name,
        description: req.description,
    };
    let mission = Mission::from(state.missions.update(&auth.identity, id, changes).await?);

    log_activity(
        &state.event_bus,
        "updated",
        &auth.identity.id,
        &mission,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(mission))
}

#[utoipa::path(
    put,
    path = "/missions/{id}/export",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Export flag set", body = Mission),
        (status = 403, description = "Caller is not ADMIN")
    )
)]
pub async fn set_export(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ExportRequest>,
) -> AppResult<Json<Mission>> {
    let mission = Mission::from(state.missions.set_export_flag(&auth.identity, id, req.exported).await?);

    log_activity(
        &state.event_bus,
        "exported",
        &auth.identity.id,
        &mission,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(mission))
}

#[utoipa::path(
    get,
    path = "/missions/{id}/access",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
    responses(
        (status = 200, description = "Caller's permission", body = MissionAccess),
        (status = 404, description = "Mission or membership not found")
    )
)]
pub async fn my_access(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<MissionAccess>> {
    let permission = state.missions.access_level_of(id, &auth.identity.id).await?;
    Ok(Json(MissionAccess {
        mission_id: id,
        user_id: auth.identity.id,
        permission,
    }))
}

/// Members may look up the permission of any other member.
#[utoipa::path(
    get,
    path = "/missions/{id}/access/{user_id}",
    tag = "Missions",
    params(
        ("id" = Uuid, Path, description = "Mission id"),
        ("user_id" = String, Path, description = "Member id")
    ),
    responses(
        (status = 200, description = "Member's permission", body = MissionAccess),
        (status = 404, description = "Mission or membership not found")
    )
)]
pub async fn user_access(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, String)>,
) -> AppResult<Json<MissionAccess>> {
    state
        .missions
        .engine()
        .authorize(actions::VIEW_ACCESS, id, &auth.identity.id, MissionPermission::LOWEST)
        .await?;
    let permission = state.missions.access_level_of(id, &user_id).await?;

    Ok(Json(MissionAccess {
        mission_id: id,
        user_id,
        permission,
    }))
}

#[utoipa::path(
    post,
    path = "/missions/{id}/join-requests",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
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
    state.missions.request_join(&auth.identity, id).await?;

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
    path = "/missions/{id}/join-requests",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
    responses((status = 204, description = "Join request withdrawn"))
)]
pub async fn cancel_join_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.missions.cancel_join_request(&auth.identity, id).await?;

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
    path = "/missions/{id}/join-requests/{user_id}",
    tag = "Missions",
    params(
        ("id" = Uuid, Path, description = "Mission id"),
        ("user_id" = String, Path, description = "Applicant id")
    ),
    request_body = MissionGrantRequest,
    responses(
        (status = 200, description = "Applicant admitted", body = MissionAccess),
        (status = 403, description = "Caller is not ADMIN"),
        (status = 404, description = "No pending request or unknown user")
    )
)]
pub async fn accept_join_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
    ValidatedJson(req): ValidatedJson<MissionGrantRequest>,
) -> AppResult<Json<MissionAccess>> {
    let permission = state
        .missions
        .accept_join_request(&auth.identity, &user_id, id, req.permission)
        .await?;

    log_activity(
        &state.event_bus,
        "join_accepted",
        &auth.identity.id,
        &membership_change(id, &user_id, Some(permission)),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(MissionAccess {
        mission_id: id,
        user_id,
        permission,
    }))
}

#[utoipa::path(
    delete,
    path = "/missions/{id}/join-requests/{user_id}",
    tag = "Missions",
    params(
        ("id" = Uuid, Path, description = "Mission id"),
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
    state.missions.reject_join_request(&auth.identity, &user_id, id).await?;

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
    path = "/missions/{id}/members",
    tag = "Missions",
    params(("id" = Uuid, Path, description = "Mission id")),
    request_body = MissionAddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = MissionAccess),
        (status = 403, description = "Caller is not ADMIN"),
        (status = 409, description = "Already a member")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<MissionAddMemberRequest>,
) -> AppResult<(StatusCode, Json<MissionAccess>)> {
    let permission = state
        .missions
        .add_member(&auth.identity, &req.user_id, id, req.permission)
        .await?;

    log_activity(
        &state.event_bus,
        "member_added",
        &auth.identity.id,
        &membership_change(id, &req.user_id, Some(permission)),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((
        StatusCode::CREATED,
        Json(MissionAccess {
            mission_id: id,
            user_id: req.user_id,
            permission,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/missions/{id}/members/{user_id}",
    tag = "Missions",
    params(
        ("id" = Uuid, Path, description = "Mission id"),
        ("user_id" = String, Path, description = "Member id")
    ),
    request_body = MissionGrantRequest,
    responses(
        (status = 200, description = "Permission changed", body = MissionAccess),
        (status = 404, description = "Not a member")
    )
)]
pub async fn change_member_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
    ValidatedJson(req): ValidatedJson<MissionGrantRequest>,
) -> AppResult<Json<MissionAccess>> {
    let permission = req.permission.ok_or_else(|| AppError::missing_argument("permission"))?;
    state
        .missions
        .change_member_level(&auth.identity, &user_id, id, permission)
        .await?;

    log_activity(
        &state.event_bus,
        "member_level_changed",
        &auth.identity.id,
        &membership_change(id, &user_id, Some(permission)),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(MissionAccess {
        mission_id: id,
        user_id,
        permission,
    }))
}

#[utoipa::path(
    delete,
    path = "/missions/{id}/members/{user_id}",
    tag = "Missions",
    params(
        ("id" = Uuid, Path, description = "Mission id"),
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
    state.missions.remove_or_leave(&auth.identity, &user_id, id).await?;

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
