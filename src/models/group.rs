use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::GroupRole;
use super::resource::{GroupKind, Resource, ResourceStatus};
use super::user::Identity;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupMember {
    pub user_id: String,
    pub role: GroupRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator: Identity,
    pub members: Vec<GroupMember>,
    pub join_requests: Vec<String>,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Group {
    fn entity_type() -> &'static str { "group" }
    fn subject_id(&self) -> String { self.id.to_string() }
}

impl From<Resource<GroupKind>> for Group {
    fn from(value: Resource<GroupKind>) -> Self {
        Group {
            id: value.id,
            name: value.name,
            description: value.description,
            creator: value.creator,
            members: value
                .members
                .into_iter()
                .map(|member| GroupMember {
                    user_id: member.user_id,
                    role: member.level,
                })
                .collect(),
            join_requests: value.join_requests,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GroupCreateRequest {
    #[schema(example = "Cartographers")]
    pub name: String,
    #[schema(example = "Everyone who maintains the map layers.")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GroupUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GroupGrantRequest {
    pub role: Option<GroupRole>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupAddMemberRequest {
    #[schema(example = "u-2002")]
    pub user_id: String,
    pub role: Option<GroupRole>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupAccess {
    pub group_id: Uuid,
    pub user_id: String,
    pub role: GroupRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMembershipChange {
    pub group_id: Uuid,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<GroupRole>,
}

impl Loggable for GroupMembershipChange {
    fn entity_type() -> &'static str { "group" }
    fn subject_id(&self) -> String { self.group_id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}
