use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use glycemia_companion::companion::Companion;
use glycemia_companion::config::{Config, DeviceRole};
use glycemia_companion::routes;
use glycemia_companion::service::{IngestOptions, IngestService};
use glycemia_companion::storage::Storage;
use glycemia_companion::sync::{HttpTransport, Propagator};

#[derive(Debug, Deserialize)]
struct ReadingView {
    value: f64,
    unit: String,
    timestamp: i64,
    status: String,
    status_label: String,
    color: String,
    time_ago: String,
}

#[derive(Debug, Deserialize)]
struct DisplayView {
    clock: String,
    display: String,
    status_label: String,
    reading: Option<serde_json::Value>,
}

fn test_config(role: DeviceRole) -> Config {
    // ---
    Config {
        role,
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        db_url: "sqlite::memory:".into(),
        db_pool_max: 1,
        history_capacity: 20,
        companion_history_capacity: 48,
        companion_url: None,
        ingest_url: None,
        sync_poll: Duration::from_secs(15),
        time_ago_refresh: Duration::from_secs(30),
        transport_timeout: Duration::from_secs(2),
        outbound_queue_depth: 8,
        allow_shell_source: false,
        display_utc_offset_minutes: 0,
    }
}

async fn bind() -> Result<(TcpListener, String)> {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    Ok((listener, base))
}

/// Serve an ingest router; pushes go to `companion_url` when given.
async fn spawn_ingest(listener: TcpListener, companion_url: Option<&str>) -> Result<()> {
    // ---
    let storage = Storage::connect("sqlite::memory:", 1).await?;
    let mut transport = HttpTransport::new(Duration::from_secs(2))?;
    if let Some(url) = companion_url {
        transport = transport.with_companion(url);
    }
    let propagator = Propagator::spawn(Arc::new(transport), 8);
    let service = IngestService::restore(storage, propagator, IngestOptions::default()).await;

    let app = routes::ingest_router(Arc::new(service), test_config(DeviceRole::Ingest));
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(())
}

async fn spawn_companion(listener: TcpListener, ingest_url: &str) -> Result<()> {
    // ---
    let transport = HttpTransport::new(Duration::from_secs(2))?.with_ingest(ingest_url);
    let companion = Arc::new(Companion::new(Arc::new(transport), 48));

    let app = routes::companion_router(companion, test_config(DeviceRole::Companion));
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(())
}

async fn wait_for_display(client: &Client, base: &str, expected: &str) -> Result<DisplayView> {
    // ---
    let url = format!("{}/display", base);
    for _ in 0..100 {
        let view: DisplayView = client.get(&url).send().await?.json().await?;
        if view.display == expected {
            return Ok(view);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("companion never displayed {}", expected)
}

#[tokio::test]
async fn notification_flows_to_companion() -> Result<()> {
    // ---
    let (companion_listener, companion_base) = bind().await?;
    let (ingest_listener, ingest_base) = bind().await?;
    spawn_companion(companion_listener, &ingest_base).await?;
    spawn_ingest(ingest_listener, Some(&companion_base)).await?;

    let client = Client::new();
    let response = client
        .post(format!("{}/notifications", ingest_base))
        .json(&json!({
            "notification": {
                "app": "com.camdiab.fx_alert.mmoll",
                "title": "CamAPS FX",
                "text": "7.2 mmol/L →",
                "subText": "Auto mode"
            }
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let accepted: ReadingView = response.json().await?;
    assert_eq!(accepted.value, 7.2);
    assert_eq!(accepted.unit, "mmol/L");
    assert_eq!(accepted.status, "in_range");
    assert_eq!(accepted.status_label, "In range");
    assert_eq!(accepted.color, "#81C784");
    assert_eq!(accepted.time_ago, "Just now");

    let latest: Option<ReadingView> = client
        .get(format!("{}/glycemia/latest", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(latest.map(|r| r.timestamp), Some(accepted.timestamp));

    // 1) Pushed to the wrist display without any polling.
    let display = wait_for_display(&client, &companion_base, "7.2 mmol/L").await?;
    assert_eq!(display.status_label, "In range");
    assert_eq!(display.clock.len(), 5);
    assert!(display.reading.is_some());

    // 2) Notifications from other apps are ignored.
    let response = client
        .post(format!("{}/notifications", ingest_base))
        .json(&json!({"app": "com.evil.camdiab", "text": "3.1 mmol/L"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let history: Vec<ReadingView> = client
        .get(format!("{}/glycemia/history", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(history.len(), 1);

    Ok(())
}

#[tokio::test]
async fn sync_request_recovers_missed_push() -> Result<()> {
    // ---
    let (companion_listener, companion_base) = bind().await?;
    let (ingest_listener, ingest_base) = bind().await?;
    spawn_companion(companion_listener, &ingest_base).await?;
    // No push target: every delivery to the companion is lost.
    spawn_ingest(ingest_listener, None).await?;

    let client = Client::new();
    let response = client
        .post(format!("{}/notifications", ingest_base))
        .json(&json!({"app": "com.camdiab.fx_alert.mgdl", "text": "BG 145 mg/dL"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let display: DisplayView = client
        .get(format!("{}/display", companion_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(display.display, "--");
    assert!(display.reading.is_none());

    let fetched: Option<serde_json::Value> = client
        .post(format!("{}/sync/request", companion_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(fetched.unwrap()["unit"], "mg/dL");

    wait_for_display(&client, &companion_base, "145.0 mg/dL").await?;
    Ok(())
}

#[tokio::test]
async fn history_delete_and_health() -> Result<()> {
    // ---
    let (ingest_listener, ingest_base) = bind().await?;
    spawn_ingest(ingest_listener, None).await?;
    let client = Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health, json!({"status": "ok", "role": "ingest"}));

    let accepted: ReadingView = client
        .post(format!("{}/notifications", ingest_base))
        .json(&json!({"app": "com.camdiab", "title": "Glucose: 6.1"}))
        .send()
        .await?
        .json()
        .await?;

    // Unknown timestamp: no-op.
    let response = client
        .delete(format!("{}/glycemia/history/{}", ingest_base, accepted.timestamp + 1))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let history: Vec<ReadingView> = client
        .get(format!("{}/glycemia/history", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(history.len(), 1);

    client
        .delete(format!("{}/glycemia/history/{}", ingest_base, accepted.timestamp))
        .send()
        .await?;
    let history: Vec<ReadingView> = client
        .get(format!("{}/glycemia/history", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert!(history.is_empty());

    // The latest slot survives history deletion, and resync re-enters it.
    let resynced: Option<ReadingView> = client
        .post(format!("{}/glycemia/resync", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resynced.map(|r| r.value), Some(6.1));

    let synced: serde_json::Value = client
        .get(format!("{}/sync/latest", ingest_base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(synced["value"], 6.1);

    Ok(())
}
