use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::access::AccessLevel;
use crate::models::resource::ResourceKind;
use crate::store::ResourceStore;

/// Access level an identity currently holds on a resource. Derived from the
/// member set on every call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant<L> {
    pub resource_id: Uuid,
    pub user_id: String,
    pub level: L,
}

/// Pure ordinal gate: succeeds iff `held >= required`.
pub fn check_level<L: AccessLevel>(action: &str, held: L, required: L) -> AppResult<()> {
    if held < required {
        return Err(AppError::insufficient_level(action, held, required));
    }
    Ok(())
}

/// Look up the grant of `user_id`.
///
/// A missing resource and a missing membership are both `NotFound`; an
/// absent member has no level to compare.
pub async fn grant_of<K: ResourceKind>(
    store: &dyn ResourceStore<K>,
    resource_id: Uuid,
    user_id: &str,
) -> AppResult<Grant<K::Level>> {
    let resource = store
        .get_by_id(resource_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} with id: {}", K::NAME, resource_id)))?;

    let level = resource
        .grant_of(user_id)
        .ok_or_else(|| AppError::not_found(format!("user '{}' in {} '{}'", user_id, K::NAME, resource_id)))?;

    Ok(Grant {
        resource_id,
        user_id: user_id.to_string(),
        level,
    })
}

/// Gate run before every privileged operation on a resource.
pub async fn authorize<K: ResourceKind>(
    store: &dyn ResourceStore<K>,
    action: &str,
    resource_id: Uuid,
    actor_id: &str,
    required: K::Level,
) -> AppResult<Grant<K::Level>> {
    let grant = match grant_of(store, resource_id, actor_id).await {
        Ok(grant) => grant,
        Err(err) => {
            tracing::debug!(
                resource = K::NAME,
                resource_id = %resource_id,
                user_id = %actor_id,
                action,
                "no grant to evaluate"
            );
            return Err(err);
        }
    };

    if let Err(err) = check_level(action, grant.level, required) {
        tracing::debug!(
            resource = K::NAME,
            resource_id = %resource_id,
            user_id = %actor_id,
            action,
            held = %grant.level,
            required = %required,
            "access denied"
        );
        return Err(err);
    }

    tracing::debug!(
        resource = K::NAME,
        resource_id = %resource_id,
        user_id = %actor_id,
        action,
        held = %grant.level,
        "access granted"
    );
    Ok(grant)
}
