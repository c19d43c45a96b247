use std::sync::Arc;

use uuid::Uuid;

use super::guard::{self, Grant};
use crate::errors::{AppError, AppResult};
use crate::models::resource::ResourceKind;
use crate::store::{ResourceStore, ResourceUpdate};

/// Membership primitives over one resource kind.
///
/// Each mutation is one atomic store update and reports whether a document
/// matched. Callers turn `false` into an error; the engine never retries.
pub struct MembershipEngine<K: ResourceKind> {
    store: Arc<dyn ResourceStore<K>>,
}

impl<K: ResourceKind> Clone for MembershipEngine<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K: ResourceKind> MembershipEngine<K> {
    pub fn new(store: Arc<dyn ResourceStore<K>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ResourceStore<K> {
        self.store.as_ref()
    }

    pub async fn authorize(
        &self,
        action: &str,
        resource_id: Uuid,
        actor_id: &str,
        required: K::Level,
    ) -> AppResult<Grant<K::Level>> {
        guard::authorize(self.store(), action, resource_id, actor_id, required).await
    }

    pub async fn grant_of(&self, resource_id: Uuid, user_id: &str) -> AppResult<Grant<K::Level>> {
        guard::grant_of(self.store(), resource_id, user_id).await
    }

    /// Add-to-set on the join requests; repeating a request is a no-op.
    pub async fn request_join(&self, resource_id: Uuid, actor_id: &str) -> AppResult<bool> {
        self.apply(resource_id, ResourceUpdate::new().add_to_join_requests(actor_id))
            .await
    }

    /// Pull from the join requests. Serves both self-cancel and admin reject.
    pub async fn cancel_or_reject(&self, resource_id: Uuid, actor_id: &str) -> AppResult<bool> {
        self.apply(resource_id, ResourceUpdate::new().pull_from_join_requests(actor_id))
            .await
    }

    /// Add the member and pull the same user's join request in one update;
    /// `false` when the user already is a member.
    pub async fn grant_membership(&self, resource_id: Uuid, user_id: &str, level: K::Level) -> AppResult<bool> {
        let update = ResourceUpdate::new()
            .add_to_members(user_id, level)
            .pull_from_join_requests(user_id);
        self.apply(resource_id, update).await
    }

    /// Turn a pending join request into a membership; `false` unless the
    /// request is still pending when the update runs.
    pub async fn admit_join_request(&self, resource_id: Uuid, user_id: &str, level: K::Level) -> AppResult<bool> {
        let update = ResourceUpdate::new()
            .add_to_members(user_id, level)
            .consume_join_request(user_id);
        self.apply(resource_id, update).await
    }

    /// Replace the level of an existing member in place; `false` when the
    /// resource or the member is absent.
    pub async fn revise_membership_level(&self, resource_id: Uuid, user_id: &str, level: K::Level) -> AppResult<bool> {
        self.apply(resource_id, ResourceUpdate::new().set_member_level(user_id, level))
            .await
    }

    pub async fn revoke_membership(&self, resource_id: Uuid, user_id: &str) -> AppResult<bool> {
        self.apply(resource_id, ResourceUpdate::new().pull_from_members(user_id))
            .await
    }

    async fn apply(&self, resource_id: Uuid, update: ResourceUpdate<K::Level>) -> AppResult<bool> {
        let updated = self.store.find_one_and_update(resource_id, update).await?;
        Ok(updated.is_some())
    }
}

/// Surface a store update that matched nothing.
pub fn ensure_applied(applied: bool, action: &str) -> AppResult<()> {
    if applied {
        Ok(())
    } else {
        Err(AppError::action_failed(action))
    }
}
