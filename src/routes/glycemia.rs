use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::display::{offset_from_minutes, ReadingView};
use crate::history::TrendPoint;
use crate::models::Reading;
use crate::service::IngestService;
use crate::Config;

// ---

type IngestState = (Arc<IngestService>, Config);

pub fn router() -> Router<IngestState> {
    // ---
    Router::new()
        .route("/glycemia/latest", get(latest))
        .route("/glycemia/history", get(history).delete(clear_history))
        .route("/glycemia/history/{timestamp}", delete(remove_entry))
        .route("/glycemia/trend", get(trend))
        .route("/glycemia/resync", post(resync))
        .route("/glycemia/push", post(push))
        .route(crate::sync::LATEST_PATH, get(sync_latest))
}

fn view_clock(config: &Config) -> (i64, FixedOffset) {
    (
        Utc::now().timestamp_millis(),
        offset_from_minutes(config.display_utc_offset_minutes),
    )
}

async fn latest(State((service, config)): State<IngestState>) -> Json<Option<ReadingView>> {
    // ---
    let (now, offset) = view_clock(&config);
    Json(service.latest().map(|r| ReadingView::new(r, now, offset)))
}

async fn history(State((service, config)): State<IngestState>) -> Json<Vec<ReadingView>> {
    // ---
    let (now, offset) = view_clock(&config);
    let entries = service
        .history()
        .into_iter()
        .map(|r| ReadingView::new(r, now, offset))
        .collect();
    Json(entries)
}

async fn remove_entry(
    State((service, _)): State<IngestState>,
    Path(timestamp): Path<i64>,
) -> StatusCode {
    // ---
    debug!("DELETE /glycemia/history/{}", timestamp);
    service.remove(timestamp);
    StatusCode::NO_CONTENT
}

async fn clear_history(State((service, _)): State<IngestState>) -> StatusCode {
    // ---
    info!("Clearing glycemia history");
    service.clear_history();
    StatusCode::NO_CONTENT
}

async fn trend(State((service, _)): State<IngestState>) -> Json<Vec<TrendPoint>> {
    Json(service.trend())
}

async fn resync(State((service, config)): State<IngestState>) -> Json<Option<ReadingView>> {
    // ---
    let reading = service.resync().await;
    let (now, offset) = view_clock(&config);
    Json(reading.map(|r| ReadingView::new(r, now, offset)))
}

#[derive(Serialize)]
struct PushResponse {
    queued: bool,
}

async fn push(State((service, _)): State<IngestState>) -> impl IntoResponse {
    // ---
    let queued = service.push_latest();
    debug!("POST /glycemia/push - queued={}", queued);
    Json(PushResponse { queued })
}

/// Delivery slot read by the companion's periodic pull.
async fn sync_latest(State((service, _)): State<IngestState>) -> Json<Option<Reading>> {
    Json(service.latest())
}
