use crate::models::resource::GroupKind;

use super::resources::ResourceService;

/// Groups carry no export flag and no workflow status beyond `created`.
pub type GroupsService = ResourceService<GroupKind>;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::errors::AppError;
    use crate::models::access::GroupRole;
    use crate::models::resource::ResourceStatus;
    use crate::models::user::Identity;
    use crate::services::{ResourceChanges, ResourceDraft, UserDirectory};
    use crate::store::SqliteResourceStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> (GroupsService, UserDirectory) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();

        let users = UserDirectory::new(pool.clone());
        let service = GroupsService::new(
            Arc::new(SqliteResourceStore::<GroupKind>::new(pool)),
            Arc::new(users.clone()),
        );
        (service, users)
    }

    fn draft() -> ResourceDraft {
        ResourceDraft {
            name: "Cartographers".to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn creator_is_admin() {
        let (groups, _) = service().await;
        let owner = Identity::new("g1", "Owner", "org");
        let group = groups.create(draft(), &owner).await.unwrap();
        assert_eq!(groups.access_level_of(group.id, "g1").await.unwrap(), GroupRole::Admin);
        assert!(matches!(groups.access_level_of(group.id, "g2").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_keeps_status_and_requires_admin() {
        let (groups, users) = service().await;
        let owner = Identity::new("g1", "Owner", "org");
        let member = Identity::new("g2", "Member", "org");
        users.register(&member).await.unwrap();
        let group = groups.create(draft(), &owner).await.unwrap();
        groups.add_member(&owner, "g2", group.id, None).await.unwrap();

        let changes = ResourceChanges {
            name: None,
            description: Some("map layers".to_string()),
        };
        assert!(matches!(
            groups.update(&member, group.id, changes.clone()).await,
            Err(AppError::Forbidden(_))
        ));

        let updated = groups.update(&owner, group.id, changes).await.unwrap();
        assert_eq!(updated.description.as_deref(), Some("map layers"));
        assert_eq!(updated.status, ResourceStatus::Created);
    }

    #[tokio::test]
    async fn reject_removes_pending_request() {
        let (groups, _) = service().await;
        let owner = Identity::new("g1", "Owner", "org");
        let applicant = Identity::new("g2", "Applicant", "org");
        let group = groups.create(draft(), &owner).await.unwrap();

        groups.request_join(&applicant, group.id).await.unwrap();
        let err = groups.reject_join_request(&applicant, "g2", group.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        groups.reject_join_request(&owner, "g2", group.id).await.unwrap();
        let group = groups.get(group.id).await.unwrap();
        assert!(group.join_requests.is_empty());
        assert!(!group.is_member("g2"));
    }

    #[tokio::test]
    async fn change_level_of_non_member_is_not_found() {
        let (groups, _) = service().await;
        let owner = Identity::new("g1", "Owner", "org");
        let group = groups.create(draft(), &owner).await.unwrap();

        let err = groups
            .change_member_level(&owner, "nobody", group.id, GroupRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn names_and_batch_reads() {
        let (groups, _) = service().await;
        let owner = Identity::new("g1", "Owner", "org");
        let first = groups.create(draft(), &owner).await.unwrap();
        let second = groups
            .create(
                ResourceDraft {
                    name: "Surveyors".to_string(),
                    description: None,
                },
                &owner,
            )
            .await
            .unwrap();

        let mut names = groups.list_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["Cartographers".to_string(), "Surveyors".to_string()]);
        assert_eq!(groups.get_many(&[first.id, second.id]).await.unwrap().len(), 2);
        assert_eq!(groups.list().await.unwrap().len(), 2);
    }
}
