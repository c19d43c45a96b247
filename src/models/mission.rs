use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::MissionPermission;
use super::resource::{MissionKind, Resource, ResourceStatus};
use super::user::Identity;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MissionMember {
    pub user_id: String,
    pub permission: MissionPermission,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Mission {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator: Identity,
    pub members: Vec<MissionMember>,
    pub join_requests: Vec<String>,
    pub status: ResourceStatus,
    pub exported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Mission {
    fn entity_type() -> &'static str { "mission" }
    fn subject_id(&self) -> String { self.id.to_string() }
}

impl From<Resource<MissionKind>> for Mission {
    fn from(value: Resource<MissionKind>) -> Self {
        Mission {
            id: value.id,
            name: value.name,
            description: value.description,
            creator: value.creator,
            members: value
                .members
                .into_iter()
                .map(|member| MissionMember {
                    user_id: member.user_id,
                    permission: member.level,
                })
                .collect(),
            join_requests: value.join_requests,
            status: value.status,
            exported: value.exported,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MissionCreateRequest {
    #[schema(example = "Alpha")]
    pub name: String,
    #[schema(example = "Survey the northern ridge.")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MissionUpdateRequest {
    #[schema(example = "Alpha II")]
    pub name: Option<String>,
    #[schema(example = "Updated description")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportRequest {
    pub exported: bool,
}

/// Body for accept, add and change-level operations; the level defaults to MEMBER.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MissionGrantRequest {
    pub permission: Option<MissionPermission>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MissionAddMemberRequest {
    #[schema(example = "u-2002")]
    pub user_id: String,
    pub permission: Option<MissionPermission>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MissionAccess {
    pub mission_id: Uuid,
    pub user_id: String,
    pub permission: MissionPermission,
}

/// Membership mutation on a mission, recorded in the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct MissionMembershipChange {
    pub mission_id: Uuid,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<MissionPermission>,
}

impl Loggable for MissionMembershipChange {
    fn entity_type() -> &'static str { "mission" }
    fn subject_id(&self) -> String { self.mission_id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}
