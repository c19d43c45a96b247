use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{ResourceStore, ResourceUpdate};
use crate::errors::{AppError, AppResult};
use crate::models::access::AccessLevel;
use crate::models::resource::{DbMember, DbResourceHead, Member, NewResource, Resource, ResourceKind};
use crate::utils::utc_now;

const HEAD_COLUMNS: &str =
    "id, name, description, creator_id, creator_name, creator_hierarchy, status, exported, created_at, updated_at";

/// One table per kind holds the document head; members and join requests
/// live in identity-keyed side tables so set operators are single statements.
#[derive(Debug)]
pub struct SqliteResourceStore<K> {
    pool: SqlitePool,
    _kind: PhantomData<K>,
}

impl<K> Clone for SqliteResourceStore<K> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: ResourceKind> SqliteResourceStore<K> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _kind: PhantomData,
        }
    }

    async fn fetch_head(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<DbResourceHead>> {
        let sql = format!("SELECT {HEAD_COLUMNS} FROM {} WHERE id = ?", K::TABLE);
        let head = sqlx::query_as::<_, DbResourceHead>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(head)
    }

    async fn hydrate(conn: &mut SqliteConnection, head: DbResourceHead) -> AppResult<Resource<K>> {
        let members_sql = format!(
            "SELECT user_id, level FROM {} WHERE resource_id = ? ORDER BY rowid",
            K::MEMBERS_TABLE
        );
        let members = sqlx::query_as::<_, DbMember>(&members_sql)
            .bind(&head.id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Member::<K::Level>::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let requests_sql = format!(
            "SELECT user_id FROM {} WHERE resource_id = ? ORDER BY rowid",
            K::JOIN_REQUESTS_TABLE
        );
        let join_requests: Vec<String> = sqlx::query_scalar(&requests_sql)
            .bind(&head.id)
            .fetch_all(&mut *conn)
            .await?;

        head.into_resource::<K>(members, join_requests)
    }

    async fn hydrate_all(conn: &mut SqliteConnection, heads: Vec<DbResourceHead>) -> AppResult<Vec<Resource<K>>> {
        let mut resources = Vec::with_capacity(heads.len());
        for head in heads {
            resources.push(Self::hydrate(conn, head).await?);
        }
        Ok(resources)
    }
}

#[async_trait]
impl<K: ResourceKind> ResourceStore<K> for SqliteResourceStore<K> {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Resource<K>>> {
        let mut conn = self.pool.acquire().await?;
        match Self::fetch_head(&mut conn, &id.to_string()).await? {
            Some(head) => Ok(Some(Self::hydrate(&mut conn, head).await?)),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> AppResult<Vec<Resource<K>>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {HEAD_COLUMNS} FROM {} ORDER BY created_at DESC", K::TABLE);
        let heads = sqlx::query_as::<_, DbResourceHead>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        Self::hydrate_all(&mut conn, heads).await
    }

    async fn find_by_member(&self, user_id: &str) -> AppResult<Vec<Resource<K>>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {HEAD_COLUMNS} FROM {} WHERE id IN (SELECT resource_id FROM {} WHERE user_id = ?) ORDER BY created_at DESC",
            K::TABLE,
            K::MEMBERS_TABLE
        );
        let heads = sqlx::query_as::<_, DbResourceHead>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Self::hydrate_all(&mut conn, heads).await
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Resource<K>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.acquire().await?;
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {HEAD_COLUMNS} FROM {} WHERE id IN (", K::TABLE));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ORDER BY created_at DESC");

        let heads = builder
            .build_query_as::<DbResourceHead>()
            .fetch_all(&mut *conn)
            .await?;
        Self::hydrate_all(&mut conn, heads).await
    }

    async fn insert(&self, resource: NewResource<K>) -> AppResult<Resource<K>> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO {} ({HEAD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            K::TABLE
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&resource.name)
            .bind(&resource.description)
            .bind(&resource.creator.id)
            .bind(&resource.creator.name)
            .bind(&resource.creator.hierarchy)
            .bind(resource.status.as_str())
            .bind(resource.exported)
            .bind(resource.created_at)
            .bind(resource.updated_at)
            .execute(&mut *tx)
            .await?;

        let member_sql = format!(
            "INSERT OR IGNORE INTO {} (resource_id, user_id, level) VALUES (?, ?, ?)",
            K::MEMBERS_TABLE
        );
        for member in &resource.members {
            sqlx::query(&member_sql)
                .bind(&id)
                .bind(&member.user_id)
                .bind(member.level.ordinal())
                .execute(&mut *tx)
                .await?;
        }

        let head = Self::fetch_head(&mut tx, &id)
            .await?
            .ok_or_else(|| AppError::internal(format!("{} {} vanished during insert", K::NAME, id)))?;
        let inserted = Self::hydrate(&mut tx, head).await?;

        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_one_and_update(
        &self,
        id: Uuid,
        update: ResourceUpdate<K::Level>,
    ) -> AppResult<Option<Resource<K>>> {
        let key = id.to_string();
        let mut tx = self.pool.begin().await?;

        // Writing the head first takes the write lock for the whole document
        // before any set operator runs.
        let head_sql = format!(
            "UPDATE {} SET updated_at = ?, name = COALESCE(?, name), description = COALESCE(?, description), status = COALESCE(?, status), exported = COALESCE(?, exported) WHERE id = ?",
            K::TABLE
        );
        let matched = sqlx::query(&head_sql)
            .bind(utc_now())
            .bind(&update.name)
            .bind(&update.description)
            .bind(update.status.map(|status| status.as_str()))
            .bind(update.exported)
            .bind(&key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if matched == 0 {
            return Ok(None);
        }

        if let Some(user_id) = &update.consume_join_request {
            let sql = format!("DELETE FROM {} WHERE resource_id = ? AND user_id = ?", K::JOIN_REQUESTS_TABLE);
            let consumed = sqlx::query(&sql)
                .bind(&key)
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if consumed == 0 {
                return Ok(None);
            }
        }

        if let Some(user_id) = &update.pull_join_request {
            let sql = format!("DELETE FROM {} WHERE resource_id = ? AND user_id = ?", K::JOIN_REQUESTS_TABLE);
            sqlx::query(&sql).bind(&key).bind(user_id).execute(&mut *tx).await?;
        }

        if let Some(user_id) = &update.pull_member {
            let sql = format!("DELETE FROM {} WHERE resource_id = ? AND user_id = ?", K::MEMBERS_TABLE);
            sqlx::query(&sql).bind(&key).bind(user_id).execute(&mut *tx).await?;
        }

        if let Some(member) = &update.add_member {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (resource_id, user_id, level) VALUES (?, ?, ?)",
                K::MEMBERS_TABLE
            );
            let inserted = sqlx::query(&sql)
                .bind(&key)
                .bind(&member.user_id)
                .bind(member.level.ordinal())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            // Already a member: keep the stored level and report no match.
            if inserted == 0 {
                return Ok(None);
            }

            let sql = format!("DELETE FROM {} WHERE resource_id = ? AND user_id = ?", K::JOIN_REQUESTS_TABLE);
            sqlx::query(&sql).bind(&key).bind(&member.user_id).execute(&mut *tx).await?;
        }

        if let Some(member) = &update.set_member_level {
            let sql = format!(
                "UPDATE {} SET level = ? WHERE resource_id = ? AND user_id = ?",
                K::MEMBERS_TABLE
            );
            let replaced = sqlx::query(&sql)
                .bind(member.level.ordinal())
                .bind(&key)
                .bind(&member.user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if replaced == 0 {
                // Dropping the transaction rolls back the head write.
                return Ok(None);
            }
        }

        if let Some(user_id) = &update.add_join_request {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (resource_id, user_id) SELECT ?, ? WHERE NOT EXISTS (SELECT 1 FROM {} WHERE resource_id = ? AND user_id = ?)",
                K::JOIN_REQUESTS_TABLE,
                K::MEMBERS_TABLE
            );
            sqlx::query(&sql)
                .bind(&key)
                .bind(user_id)
                .bind(&key)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let head = Self::fetch_head(&mut tx, &key)
            .await?
            .ok_or_else(|| AppError::internal(format!("{} {} vanished during update", K::NAME, key)))?;
        let updated = Self::hydrate(&mut tx, head).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::access::{GroupRole, MissionPermission};
    use crate::models::resource::{GroupKind, MissionKind, ResourceStatus};
    use crate::models::user::Identity;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    fn new_mission(creator: &str) -> NewResource<MissionKind> {
        let now = utc_now();
        NewResource {
            name: "Alpha".to_string(),
            description: Some("test".to_string()),
            creator: Identity::new(creator, "Creator", "org/a"),
            members: vec![Member::new(creator, MissionPermission::Admin)],
            status: ResourceStatus::Created,
            exported: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_seeds_members() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let mission = store.insert(new_mission("u1")).await.unwrap();

        assert_eq!(mission.members, vec![Member::new("u1", MissionPermission::Admin)]);
        assert!(mission.join_requests.is_empty());

        let fetched = store.get_by_id(mission.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Alpha");
        assert_eq!(fetched.creator.id, "u1");
    }

    #[tokio::test]
    async fn update_on_missing_document_matches_nothing() {
        let store = SqliteResourceStore::<GroupKind>::new(memory_pool().await);
        let result = store
            .find_one_and_update(Uuid::new_v4(), ResourceUpdate::new().add_to_members("u1", GroupRole::Member))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn adding_member_pulls_join_request_in_same_update() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let mission = store.insert(new_mission("u1")).await.unwrap();

        store
            .find_one_and_update(mission.id, ResourceUpdate::new().add_to_join_requests("u2"))
            .await
            .unwrap();
        let updated = store
            .find_one_and_update(mission.id, ResourceUpdate::new().add_to_members("u2", MissionPermission::Member))
            .await
            .unwrap()
            .unwrap();

        assert!(updated.join_requests.is_empty());
        assert_eq!(updated.grant_of("u2"), Some(MissionPermission::Member));
    }

    #[tokio::test]
    async fn adding_an_existing_member_keeps_the_stored_level() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let mission = store.insert(new_mission("u1")).await.unwrap();

        let result = store
            .find_one_and_update(
                mission.id,
                ResourceUpdate::new()
                    .set_name("Renamed")
                    .add_to_members("u1", MissionPermission::Member),
            )
            .await
            .unwrap();
        assert!(result.is_none());

        let fetched = store.get_by_id(mission.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Alpha");
        assert_eq!(fetched.grant_of("u1"), Some(MissionPermission::Admin));
    }

    #[tokio::test]
    async fn consuming_a_join_request_requires_one_pending() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let mission = store.insert(new_mission("u1")).await.unwrap();
        let admit = || {
            ResourceUpdate::new()
                .add_to_members("u2", MissionPermission::Write)
                .consume_join_request("u2")
        };

        assert!(store.find_one_and_update(mission.id, admit()).await.unwrap().is_none());
        assert!(!store.get_by_id(mission.id).await.unwrap().unwrap().is_member("u2"));

        store
            .find_one_and_update(mission.id, ResourceUpdate::new().add_to_join_requests("u2"))
            .await
            .unwrap();
        let admitted = store.find_one_and_update(mission.id, admit()).await.unwrap().unwrap();
        assert!(admitted.join_requests.is_empty());
        assert_eq!(admitted.grant_of("u2"), Some(MissionPermission::Write));
    }

    #[tokio::test]
    async fn join_request_is_not_recorded_for_members() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let mission = store.insert(new_mission("u1")).await.unwrap();

        let updated = store
            .find_one_and_update(mission.id, ResourceUpdate::new().add_to_join_requests("u1"))
            .await
            .unwrap()
            .unwrap();
        assert!(updated.join_requests.is_empty());
    }

    #[tokio::test]
    async fn level_replace_requires_a_matching_member() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let mission = store.insert(new_mission("u1")).await.unwrap();

        let missing = store
            .find_one_and_update(mission.id, ResourceUpdate::new().set_member_level("ghost", MissionPermission::Write))
            .await
            .unwrap();
        assert!(missing.is_none());

        let replaced = store
            .find_one_and_update(mission.id, ResourceUpdate::new().set_member_level("u1", MissionPermission::Write))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced.members, vec![Member::new("u1", MissionPermission::Write)]);
    }

    #[tokio::test]
    async fn find_by_member_and_find_many() {
        let store = SqliteResourceStore::<MissionKind>::new(memory_pool().await);
        let first = store.insert(new_mission("u1")).await.unwrap();
        let second = store.insert(new_mission("u2")).await.unwrap();

        let of_u1 = store.find_by_member("u1").await.unwrap();
        assert_eq!(of_u1.len(), 1);
        assert_eq!(of_u1[0].id, first.id);

        let many = store.find_many(&[first.id, second.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(store.find_all().await.unwrap().len(), 2);
    }
}
