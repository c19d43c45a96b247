//! Storage-level shape shared by missions and groups.
//!
//! A `Resource<K>` is one document: its head fields, the identity-keyed
//! `members` set and the pending `join_requests` set. Missions and groups
//! differ only by their [`ResourceKind`] marker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::{AccessLevel, GroupRole, MissionPermission};
use super::user::Identity;
use crate::errors::AppError;

pub trait ResourceKind: fmt::Debug + Clone + Send + Sync + 'static {
    type Level: AccessLevel;

    /// Singular name used in messages and event names.
    const NAME: &'static str;
    const TABLE: &'static str;
    const MEMBERS_TABLE: &'static str;
    const JOIN_REQUESTS_TABLE: &'static str;
    /// Whether a field-level update moves the workflow status to `Updated`.
    const TRACKS_WORKFLOW: bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionKind;

impl ResourceKind for MissionKind {
    type Level = MissionPermission;

    const NAME: &'static str = "mission";
    const TABLE: &'static str = "missions";
    const MEMBERS_TABLE: &'static str = "mission_members";
    const JOIN_REQUESTS_TABLE: &'static str = "mission_join_requests";
    const TRACKS_WORKFLOW: bool = true;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKind;

impl ResourceKind for GroupKind {
    type Level = GroupRole;

    const NAME: &'static str = "group";
    const TABLE: &'static str = "groups";
    const MEMBERS_TABLE: &'static str = "group_members";
    const JOIN_REQUESTS_TABLE: &'static str = "group_join_requests";
    const TRACKS_WORKFLOW: bool = false;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Created,
    Updated,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Created => "created",
            ResourceStatus::Updated => "updated",
        }
    }
}

impl FromStr for ResourceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ResourceStatus::Created),
            "updated" => Ok(ResourceStatus::Updated),
            other => Err(AppError::internal(format!("unknown resource status: {other}"))),
        }
    }
}

/// One `(user, level)` entry of a resource's member set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member<L> {
    pub user_id: String,
    pub level: L,
}

impl<L> Member<L> {
    pub fn new(user_id: impl Into<String>, level: L) -> Self {
        Self {
            user_id: user_id.into(),
            level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resource<K: ResourceKind> {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator: Identity,
    pub members: Vec<Member<K::Level>>,
    pub join_requests: Vec<String>,
    pub status: ResourceStatus,
    pub exported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<K: ResourceKind> Resource<K> {
    /// Level recorded for `user_id`, `None` when the user holds no grant.
    pub fn grant_of(&self, user_id: &str) -> Option<K::Level> {
        self.members
            .iter()
            .find(|member| member.user_id == user_id)
            .map(|member| member.level)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.grant_of(user_id).is_some()
    }

    pub fn has_join_request(&self, user_id: &str) -> bool {
        self.join_requests.iter().any(|id| id == user_id)
    }
}

/// Document handed to the store on insert; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewResource<K: ResourceKind> {
    pub name: String,
    pub description: Option<String>,
    pub creator: Identity,
    pub members: Vec<Member<K::Level>>,
    pub status: ResourceStatus,
    pub exported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbResourceHead {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub creator_name: String,
    pub creator_hierarchy: String,
    pub status: String,
    pub exported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMember {
    pub user_id: String,
    pub level: i64,
}

impl<L: AccessLevel> TryFrom<DbMember> for Member<L> {
    type Error = AppError;

    fn try_from(value: DbMember) -> Result<Self, Self::Error> {
        let level = L::from_ordinal(value.level).ok_or_else(|| {
            AppError::internal(format!("unknown access level {} for user {}", value.level, value.user_id))
        })?;
        Ok(Member::new(value.user_id, level))
    }
}

impl DbResourceHead {
    pub fn into_resource<K: ResourceKind>(
        self,
        members: Vec<Member<K::Level>>,
        join_requests: Vec<String>,
    ) -> Result<Resource<K>, AppError> {
        let id = Uuid::parse_str(&self.id).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))?;

        Ok(Resource {
            id,
            name: self.name,
            description: self.description,
            creator: Identity::new(self.creator_id, self.creator_name, self.creator_hierarchy),
            members,
            join_requests,
            status: self.status.parse()?,
            exported: self.exported,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
