//! Activity log.
//!
//! Handlers publish a [`DomainEvent`] on a broadcast bus after every
//! successful write; [`start_activity_listener`] persists them into
//! `activity_log`, chaining each row to the previous one with SHA-256.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppResult;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub subject_id: Option<String>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<String>, subject_id: Option<String>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context for activity logging (IP, User-Agent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub entity: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

/// Publish `<entity_type>.<action>` for `entity`. Never fails the caller.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: &str,
    entity: &T,
    context: Option<RequestContext>,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);

    let payload = ActivityPayload {
        entity: serde_json::to_value(entity).unwrap_or_default(),
        context,
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        event_name,
        Some(actor_id.to_string()),
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    // No receivers only means nobody is listening yet.
    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

fn describe(name: &str) -> &'static str {
    match name.split_once('.').map(|(_, action)| action) {
        Some("created") => "Resource created",
        Some("updated") => "Resource updated",
        Some("exported") => "Export flag changed",
        Some("join_requested") => "Join request submitted",
        Some("join_cancelled") => "Join request cancelled",
        Some("join_accepted") => "Join request accepted",
        Some("join_rejected") => "Join request rejected",
        Some("member_added") => "Member added",
        Some("member_level_changed") => "Member access level changed",
        Some("member_removed") => "Member removed",
        Some("member_left") => "Member left",
        Some("registered") => "Identity registered",
        _ => "System event",
    }
}

fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(e) = persist_event(&pool, &event).await {
            tracing::error!("failed to save activity log: {}", e);
        }
    }
}

async fn persist_event(pool: &SqlitePool, event: &Value) -> AppResult<()> {
    let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
    let actor_id = event.get("actor_id").and_then(|v| v.as_str());
    let subject_id = event.get("subject_id").and_then(|v| v.as_str());
    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or(Severity::Important.as_str());

    let payload = serde_json::to_string(event).unwrap_or_default();

    let mut tx = pool.begin().await?;

    // The insert takes the write lock before the chain head is read.
    let (seq, prev_hash): (i64, Option<String>) = sqlx::query_as(
        "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, payload, severity, prev_hash, hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, (SELECT hash FROM activity_log ORDER BY seq DESC LIMIT 1), '') \
         RETURNING seq, prev_hash",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(describe(name))
    .bind(actor_id)
    .bind(subject_id)
    .bind(occurred_at)
    .bind(&payload)
    .bind(severity)
    .fetch_one(&mut *tx)
    .await?;

    let hash = chain_hash(prev_hash.as_deref(), &payload);
    sqlx::query("UPDATE activity_log SET hash = ? WHERE seq = ?")
        .bind(&hash)
        .bind(seq)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ActivityEntry {
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<String>,
    pub subject_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub severity: String,
    pub hash: String,
}

pub async fn recent_activity(pool: &SqlitePool, limit: i64) -> AppResult<Vec<ActivityEntry>> {
    let rows = sqlx::query_as::<_, ActivityEntry>(
        "SELECT event_name, description, actor_id, subject_id, occurred_at, severity, hash FROM activity_log ORDER BY seq DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_chain_depends_on_previous_entry() {
        let first = chain_hash(None, "a");
        let second = chain_hash(Some(&first), "b");
        assert_ne!(second, chain_hash(None, "b"));
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn descriptions_follow_the_action_suffix() {
        assert_eq!(describe("mission.member_added"), "Member added");
        assert_eq!(describe("group.join_rejected"), "Join request rejected");
        assert_eq!(describe("weird"), "System event");
    }

    #[derive(Serialize)]
    struct Thing {
        id: String,
    }

    impl Loggable for Thing {
        fn entity_type() -> &'static str { "thing" }
        fn subject_id(&self) -> String { self.id.clone() }
    }

    #[tokio::test]
    async fn concurrent_writers_keep_one_unbroken_chain() {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("activity.db"))
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let event = DomainEvent::new(
                        "mission.updated",
                        Some(format!("u{i}")),
                        Some("m1".to_string()),
                        serde_json::json!({ "n": i }),
                    );
                    let event = serde_json::to_value(&event).unwrap();
                    persist_event(&pool, &event).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let rows: Vec<(Option<String>, String, String)> =
            sqlx::query_as("SELECT prev_hash, hash, payload FROM activity_log ORDER BY seq")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows.len(), 16);
        let mut previous: Option<String> = None;
        for (prev_hash, hash, payload) in rows {
            assert_eq!(prev_hash, previous);
            assert_eq!(hash, chain_hash(prev_hash.as_deref(), &payload));
            previous = Some(hash);
        }
    }

    #[tokio::test]
    async fn log_activity_publishes_named_event() {
        let (bus, mut rx) = init_event_bus();
        log_activity(&bus, "member_added", "u1", &Thing { id: "t1".into() }, None);

        let event = rx.recv().await.unwrap();
        assert_eq!(event["name"], "thing.member_added");
        assert_eq!(event["actor_id"], "u1");
        assert_eq!(event["subject_id"], "t1");
        assert_eq!(event["payload"]["severity"], "critical");
    }
}
