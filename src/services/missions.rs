use uuid::Uuid;

use super::resources::ResourceService;
use crate::authz::actions;
use crate::errors::AppResult;
use crate::models::access::MissionPermission;
use crate::models::resource::{MissionKind, Resource};
use crate::models::user::Identity;
use crate::store::ResourceUpdate;

pub type MissionsService = ResourceService<MissionKind>;

impl ResourceService<MissionKind> {
    /// Flip the export flag. Requires ADMIN on the mission.
    pub async fn set_export_flag(&self, actor: &Identity, id: Uuid, exported: bool) -> AppResult<Resource<MissionKind>> {
        self.engine()
            .authorize(actions::EXPORT, id, &actor.id, MissionPermission::Admin)
            .await?;

        let mission = self
            .store
            .find_one_and_update(id, ResourceUpdate::new().set_exported(exported))
            .await?
            .ok_or_else(|| self.resource_not_found(id))?;

        tracing::info!(mission_id = %id, exported, by = %actor.id, "export flag set");
        Ok(mission)
    }
}
