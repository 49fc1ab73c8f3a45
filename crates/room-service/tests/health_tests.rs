//! Health and metrics endpoint tests.
//!
//! - `GET /health` - store connectivity and connected waiters
//! - `GET /metrics` - Prometheus scrape

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use room_test_utils::TestRoomServer;

#[tokio::test]
async fn test_health_reports_healthy_store() -> Result<()> {
    let server = TestRoomServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "healthy");
    assert_eq!(body["waiters"], 0);
    Ok(())
}

#[tokio::test]
async fn test_health_reports_unavailable_store() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    server.store().set_unavailable(true);

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "unhealthy");
    Ok(())
}

#[tokio::test]
async fn test_health_counts_connected_waiters() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let owner = server.seed_owner("Carol", "carol@example.com").await?;

    let _stream = server
        .client()
        .get(format!("{}/api/wait/{}/stream", server.url(), owner.slug))
        .send()
        .await?;
    server.wait_for_waiters(&owner.slug, 1).await?;

    let body: serde_json::Value = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["waiters"], 1);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_responds() -> Result<()> {
    let server = TestRoomServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    Ok(())
}
