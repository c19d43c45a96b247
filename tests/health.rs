mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::spawn_app;

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let t = spawn_app().await?;

    let (status, body) = t.call("GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");
    assert_eq!(body["db_ok"], true, "expected db_ok: true, got: {}", body);

    Ok(())
}
