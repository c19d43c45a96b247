use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Verified `(id, name, hierarchy)` triple carried by the identity claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    #[schema(example = "u-1001")]
    pub id: String,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "org/research/analytics")]
    pub hierarchy: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, hierarchy: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hierarchy: hierarchy.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub name: String,
    pub hierarchy: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> String { self.id.clone() }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity {
            id: user.id,
            name: user.name,
            hierarchy: user.hierarchy,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub hierarchy: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            id: value.id,
            name: value.name,
            hierarchy: value.hierarchy,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub name: String,
}
