//! Business logic shared by missions and groups.

use std::sync::Arc;

use uuid::Uuid;

use super::users::IdentityLookup;
use crate::authz::{actions, ensure_applied, MembershipEngine};
use crate::errors::{AppError, AppResult};
use crate::models::access::AccessLevel;
use crate::models::resource::{Member, NewResource, Resource, ResourceKind, ResourceStatus};
use crate::models::user::Identity;
use crate::store::{ResourceStore, ResourceUpdate};
use crate::utils::{optional_text, required_text, utc_now};

/// Caller-supplied base fields of a new resource.
#[derive(Debug, Clone)]
pub struct ResourceDraft {
    pub name: String,
    pub description: Option<String>,
}

/// Partial field update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ResourceChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub struct ResourceService<K: ResourceKind> {
    pub(super) store: Arc<dyn ResourceStore<K>>,
    engine: MembershipEngine<K>,
    identities: Arc<dyn IdentityLookup>,
}

impl<K: ResourceKind> Clone for ResourceService<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
            identities: Arc::clone(&self.identities),
        }
    }
}

impl<K: ResourceKind> ResourceService<K> {
    pub fn new(store: Arc<dyn ResourceStore<K>>, identities: Arc<dyn IdentityLookup>) -> Self {
        Self {
            engine: MembershipEngine::new(Arc::clone(&store)),
            store,
            identities,
        }
    }

    pub fn engine(&self) -> &MembershipEngine<K> {
        &self.engine
    }

    // ---- reads -----------------------------------------------------------

    pub async fn list(&self) -> AppResult<Vec<Resource<K>>> {
        self.store.find_all().await
    }

    pub async fn list_names(&self) -> AppResult<Vec<String>> {
        let resources = self.store.find_all().await?;
        Ok(resources.into_iter().map(|resource| resource.name).collect())
    }

    pub async fn list_for(&self, user_id: &str) -> AppResult<Vec<Resource<K>>> {
        self.store.find_by_member(user_id).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Resource<K>> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| self.resource_not_found(id))
    }

    pub async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Resource<K>>> {
        if ids.is_empty() {
            return Err(AppError::invalid_argument("ids", "must contain at least one id"));
        }
        self.store.find_many(ids).await
    }

    pub async fn access_level_of(&self, id: Uuid, user_id: &str) -> AppResult<K::Level> {
        Ok(self.engine.grant_of(id, user_id).await?.level)
    }

    // ---- writes ----------------------------------------------------------

    /// Insert a new resource with the creator as its only, highest-level member.
    pub async fn create(&self, draft: ResourceDraft, creator: &Identity) -> AppResult<Resource<K>> {
        let name = required_text("name", &draft.name)?;
        let now = utc_now();

        let resource = self
            .store
            .insert(NewResource {
                name,
                description: optional_text(draft.description),
                creator: creator.clone(),
                members: vec![Member::new(creator.id.clone(), <K::Level as AccessLevel>::HIGHEST)],
                status: ResourceStatus::Created,
                exported: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(resource = K::NAME, resource_id = %resource.id, creator = %creator.id, "created");
        Ok(resource)
    }

    pub async fn update(&self, actor: &Identity, id: Uuid, changes: ResourceChanges) -> AppResult<Resource<K>> {
        self.engine
            .authorize(actions::UPDATE, id, &actor.id, <K::Level as AccessLevel>::EDITOR)
            .await?;

        let mut update = ResourceUpdate::new();
        if let Some(name) = changes.name {
            update = update.set_name(required_text("name", &name)?);
        }
        if let Some(description) = optional_text(changes.description) {
            update = update.set_description(description);
        }
        if update.name.is_none() && update.description.is_none() {
            return self.get(id).await;
        }
        if K::TRACKS_WORKFLOW {
            update = update.set_status(ResourceStatus::Updated);
        }

        self.store
            .find_one_and_update(id, update)
            .await?
            .ok_or_else(|| self.resource_not_found(id))
    }

    // ---- membership workflow --------------------------------------------

    /// Self-service. A current member cannot also hold a pending request.
    pub async fn request_join(&self, actor: &Identity, id: Uuid) -> AppResult<()> {
        let resource = self.get(id).await?;
        if resource.is_member(&actor.id) {
            return Err(AppError::conflict(format!(
                "user '{}' is already a member of {} '{}'",
                actor.id,
                K::NAME,
                id
            )));
        }

        let applied = self.engine.request_join(id, &actor.id).await?;
        ensure_applied(applied, actions::REQUEST_JOIN)?;
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %actor.id, "join requested");
        Ok(())
    }

    /// Self-service withdrawal of the caller's own request.
    pub async fn cancel_join_request(&self, actor: &Identity, id: Uuid) -> AppResult<()> {
        let applied = self.engine.cancel_or_reject(id, &actor.id).await?;
        ensure_applied(applied, actions::CANCEL_JOIN)?;
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %actor.id, "join request cancelled");
        Ok(())
    }

    pub async fn accept_join_request(
        &self,
        admin: &Identity,
        target_id: &str,
        id: Uuid,
        level: Option<K::Level>,
    ) -> AppResult<K::Level> {
        self.engine
            .authorize(actions::ACCEPT_JOIN, id, &admin.id, <K::Level as AccessLevel>::HIGHEST)
            .await?;

        self.identities.lookup(target_id).await?;

        let level = level.unwrap_or(<K::Level as AccessLevel>::LOWEST);
        let applied = self.engine.admit_join_request(id, target_id, level).await?;
        if !applied {
            return Err(self.refused_grant(id, target_id, actions::ACCEPT_JOIN).await);
        }
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %target_id, level = %level, by = %admin.id, "join request accepted");
        Ok(level)
    }

    pub async fn reject_join_request(&self, admin: &Identity, target_id: &str, id: Uuid) -> AppResult<()> {
        self.engine
            .authorize(actions::REJECT_JOIN, id, &admin.id, <K::Level as AccessLevel>::HIGHEST)
            .await?;

        let applied = self.engine.cancel_or_reject(id, target_id).await?;
        ensure_applied(applied, actions::REJECT_JOIN)?;
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %target_id, by = %admin.id, "join request rejected");
        Ok(())
    }

    pub async fn add_member(
        &self,
        admin: &Identity,
        target_id: &str,
        id: Uuid,
        level: Option<K::Level>,
    ) -> AppResult<K::Level> {
        self.engine
            .authorize(actions::ADD_MEMBER, id, &admin.id, <K::Level as AccessLevel>::HIGHEST)
            .await?;

        self.identities.lookup(target_id).await?;

        let level = level.unwrap_or(<K::Level as AccessLevel>::LOWEST);
        let applied = self.engine.grant_membership(id, target_id, level).await?;
        if !applied {
            return Err(self.refused_grant(id, target_id, actions::ADD_MEMBER).await);
        }
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %target_id, level = %level, by = %admin.id, "member added");
        Ok(level)
    }

    pub async fn change_member_level(
        &self,
        admin: &Identity,
        target_id: &str,
        id: Uuid,
        level: K::Level,
    ) -> AppResult<()> {
        self.engine
            .authorize(actions::CHANGE_LEVEL, id, &admin.id, <K::Level as AccessLevel>::HIGHEST)
            .await?;

        // The resource existed a moment ago, so no match means no such member.
        let applied = self.engine.revise_membership_level(id, target_id, level).await?;
        if !applied {
            return Err(AppError::not_found(format!("user '{}' in {} '{}'", target_id, K::NAME, id)));
        }
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %target_id, level = %level, by = %admin.id, "member level changed");
        Ok(())
    }

    /// Leaving needs no grant; removing somebody else needs the highest level.
    pub async fn remove_or_leave(&self, actor: &Identity, target_id: &str, id: Uuid) -> AppResult<()> {
        let action = if actor.id == target_id {
            actions::LEAVE
        } else {
            self.engine
                .authorize(actions::REMOVE_MEMBER, id, &actor.id, <K::Level as AccessLevel>::HIGHEST)
                .await?;
            actions::REMOVE_MEMBER
        };

        let applied = self.engine.revoke_membership(id, target_id).await?;
        ensure_applied(applied, action)?;
        tracing::info!(resource = K::NAME, resource_id = %id, user_id = %target_id, by = %actor.id, action, "member removed");
        Ok(())
    }

    /// Classify a grant that matched nothing from the state left behind.
    async fn refused_grant(&self, id: Uuid, target_id: &str, action: &str) -> AppError {
        match self.store.get_by_id(id).await {
            Err(err) => err,
            Ok(None) => self.resource_not_found(id),
            Ok(Some(resource)) if resource.is_member(target_id) => AppError::conflict(format!(
                "user '{}' is already a member of {} '{}'",
                target_id,
                K::NAME,
                id
            )),
            Ok(Some(_)) if action == actions::ACCEPT_JOIN => AppError::not_found(format!(
                "join request of '{}' in {} '{}'",
                target_id,
                K::NAME,
                id
            )),
            Ok(Some(_)) => AppError::action_failed(action),
        }
    }

    pub(super) fn resource_not_found(&self, id: Uuid) -> AppError {
        AppError::not_found(format!("{} with id: {}", K::NAME, id))
    }
}
