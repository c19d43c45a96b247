use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, Identity, User};
use crate::utils::{required_text, utc_now};

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

/// Resolves a user id to the identity recorded for it.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup(&self, user_id: &str) -> AppResult<Identity>;
}

/// Identities seen through verified claims, kept in the `users` table.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record or refresh the caller's identity from their claim.
    pub async fn register(&self, identity: &Identity) -> AppResult<User> {
        let now = utc_now();
        sqlx::query(
            "INSERT INTO users (id, name, hierarchy, created_at, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET name = excluded.name, hierarchy = excluded.hierarchy, updated_at = excluded.updated_at",
        )
        .bind(&identity.id)
        .bind(&identity.name)
        .bind(&identity.hierarchy)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(&identity.id).await
    }

    pub async fn get(&self, user_id: &str) -> AppResult<User> {
        sqlx::query_as::<_, DbUser>("SELECT id, name, hierarchy, created_at, updated_at FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::from)
            .ok_or_else(|| AppError::not_found(format!("user with id: {}", user_id)))
    }

    pub async fn list(&self, skip: Option<i64>, limit: Option<i64>) -> AppResult<Vec<User>> {
        let skip = skip.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::invalid_argument("skip", "must not be negative"));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE);
        if !(1..=MAX_PAGE).contains(&limit) {
            return Err(AppError::invalid_argument("limit", format!("must be between 1 and {MAX_PAGE}")));
        }

        let users = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, hierarchy, created_at, updated_at FROM users ORDER BY name, id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Case-insensitive substring match on the display name.
    pub async fn search_by_name(&self, query: &str) -> AppResult<Vec<User>> {
        let query = required_text("name", query)?;
        let users = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, hierarchy, created_at, updated_at FROM users WHERE instr(lower(name), lower(?)) > 0 ORDER BY name, id",
        )
        .bind(&query)
        .fetch_all(&self.pool)
        .await?;

        Ok(users.into_iter().map(User::from).collect())
    }
}

#[async_trait]
impl IdentityLookup for UserDirectory {
    async fn lookup(&self, user_id: &str) -> AppResult<Identity> {
        self.get(user_id).await.map(Identity::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn directory() -> UserDirectory {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        UserDirectory::new(pool)
    }

    #[tokio::test]
    async fn register_refreshes_existing_identity() {
        let users = directory().await;
        users.register(&Identity::new("u1", "Ada", "org/a")).await.unwrap();
        let refreshed = users.register(&Identity::new("u1", "Ada L.", "org/b")).await.unwrap();

        assert_eq!(refreshed.name, "Ada L.");
        assert_eq!(users.lookup("u1").await.unwrap().hierarchy, "org/b");
    }

    #[tokio::test]
    async fn unknown_identity_is_not_found() {
        let users = directory().await;
        assert!(matches!(users.lookup("ghost").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn search_and_paging() {
        let users = directory().await;
        for (id, name) in [("u1", "Ada"), ("u2", "Grace"), ("u3", "Adam")] {
            users.register(&Identity::new(id, name, "org")).await.unwrap();
        }

        let found = users.search_by_name("ada").await.unwrap();
        assert_eq!(found.len(), 2);

        let page = users.list(Some(1), Some(1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Adam");

        assert!(matches!(users.list(None, Some(0)).await, Err(AppError::InvalidArgument { .. })));
        assert!(matches!(users.search_by_name(" ").await, Err(AppError::MissingArgument(_))));
    }
}
