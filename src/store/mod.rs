//! Document store consumed by the membership engine and the services.
//!
//! Every [`ResourceUpdate`] is applied to a single document atomically. The
//! store is the only synchronization point; callers hold no cached state.

mod sqlite;

pub use sqlite::SqliteResourceStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::resource::{Member, NewResource, Resource, ResourceKind, ResourceStatus};

/// Operators applied together by [`ResourceStore::find_one_and_update`].
///
/// `updated_at` is always bumped. Adding a member also pulls that user from
/// the join requests, and a join request is never added for a current member.
/// Adding somebody who is already a member, consuming a join request that is
/// not pending, or replacing the level of a non-member makes the whole
/// update match nothing.
#[derive(Debug, Clone)]
pub struct ResourceUpdate<L> {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ResourceStatus>,
    pub exported: Option<bool>,
    pub add_member: Option<Member<L>>,
    /// Matched-element replace: the whole update matches nothing when the
    /// user is not a member.
    pub set_member_level: Option<Member<L>>,
    pub pull_member: Option<String>,
    pub add_join_request: Option<String>,
    pub pull_join_request: Option<String>,
    /// Pull that must remove a pending request.
    pub consume_join_request: Option<String>,
}

impl<L> Default for ResourceUpdate<L> {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            status: None,
            exported: None,
            add_member: None,
            set_member_level: None,
            pull_member: None,
            add_join_request: None,
            pull_join_request: None,
            consume_join_request: None,
        }
    }
}

impl<L> ResourceUpdate<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_status(mut self, status: ResourceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn set_exported(mut self, exported: bool) -> Self {
        self.exported = Some(exported);
        self
    }

    pub fn add_to_members(mut self, user_id: impl Into<String>, level: L) -> Self {
        self.add_member = Some(Member::new(user_id, level));
        self
    }

    pub fn set_member_level(mut self, user_id: impl Into<String>, level: L) -> Self {
        self.set_member_level = Some(Member::new(user_id, level));
        self
    }

    pub fn pull_from_members(mut self, user_id: impl Into<String>) -> Self {
        self.pull_member = Some(user_id.into());
        self
    }

    pub fn add_to_join_requests(mut self, user_id: impl Into<String>) -> Self {
        self.add_join_request = Some(user_id.into());
        self
    }

    pub fn pull_from_join_requests(mut self, user_id: impl Into<String>) -> Self {
        self.pull_join_request = Some(user_id.into());
        self
    }

    pub fn consume_join_request(mut self, user_id: impl Into<String>) -> Self {
        self.consume_join_request = Some(user_id.into());
        self
    }
}

#[async_trait]
pub trait ResourceStore<K: ResourceKind>: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Resource<K>>>;

    async fn find_all(&self) -> AppResult<Vec<Resource<K>>>;

    /// Resources where `user_id` holds any grant.
    async fn find_by_member(&self, user_id: &str) -> AppResult<Vec<Resource<K>>>;

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Resource<K>>>;

    async fn insert(&self, resource: NewResource<K>) -> AppResult<Resource<K>>;

    /// Apply `update` atomically and return the post-update document, or
    /// `None` when no document matched.
    async fn find_one_and_update(
        &self,
        id: Uuid,
        update: ResourceUpdate<K::Level>,
    ) -> AppResult<Option<Resource<K>>>;
}
