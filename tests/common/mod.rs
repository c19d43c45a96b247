#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use missionary::create_app;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Keeps the database file alive for the duration of the test.
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", SECRET);
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

/// Mint an identity claim the way the upstream issuer would.
pub fn token_for(id: &str, name: &str, hierarchy: &str) -> String {
    let claims = serde_json::json!({
        "sub": id,
        "name": name,
        "hierarchy": hierarchy,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
        .expect("token encoding")
}

impl TestApp {
    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    /// Register the identity behind `token` in the user directory.
    pub async fn register(&self, token: &str) -> Result<()> {
        let (status, _) = self.call("POST", "/users/me", Some(token), None).await?;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }
}
