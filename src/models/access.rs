use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed, totally ordered set of access grades held by a member.
///
/// Authorization compares grades with `Ord`; the persisted ordinal is only a
/// storage encoding.
pub trait AccessLevel:
    Copy + Ord + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Granted on accept/add when the caller names no level.
    const LOWEST: Self;
    /// Minimum grade for editing descriptive fields.
    const EDITOR: Self;
    /// Seeded for the creator; required for membership administration.
    const HIGHEST: Self;

    fn ordinal(self) -> i64;

    fn from_ordinal(value: i64) -> Option<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionPermission {
    Member,
    Write,
    Admin,
}

impl AccessLevel for MissionPermission {
    const LOWEST: Self = MissionPermission::Member;
    const EDITOR: Self = MissionPermission::Write;
    const HIGHEST: Self = MissionPermission::Admin;

    fn ordinal(self) -> i64 {
        match self {
            MissionPermission::Member => 0,
            MissionPermission::Write => 1,
            MissionPermission::Admin => 2,
        }
    }

    fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(MissionPermission::Member),
            1 => Some(MissionPermission::Write),
            2 => Some(MissionPermission::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for MissionPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissionPermission::Member => "MEMBER",
            MissionPermission::Write => "WRITE",
            MissionPermission::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupRole {
    Member,
    Admin,
}

impl AccessLevel for GroupRole {
    const LOWEST: Self = GroupRole::Member;
    // Groups have no intermediate grade, editing is an admin action.
    const EDITOR: Self = GroupRole::Admin;
    const HIGHEST: Self = GroupRole::Admin;

    fn ordinal(self) -> i64 {
        match self {
            GroupRole::Member => 0,
            GroupRole::Admin => 1,
        }
    }

    fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(GroupRole::Member),
            1 => Some(GroupRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupRole::Member => "MEMBER",
            GroupRole::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}
