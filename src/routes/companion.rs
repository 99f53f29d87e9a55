use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::companion::Companion;
use crate::display::{format_clock, offset_from_minutes, DisplayState};
use crate::models::Reading;
use crate::sync::{Transport, PUSH_PATH, SYNC_REQUEST_PATH};
use crate::Config;

// ---

type CompanionState<T> = (Arc<Companion<T>>, Config);

pub fn router<T: Transport>() -> Router<CompanionState<T>> {
    // ---
    Router::new()
        .route("/display", get(display::<T>))
        .route(PUSH_PATH, post(receive_push::<T>))
        .route(SYNC_REQUEST_PATH, post(sync_request::<T>))
}

#[derive(Serialize)]
struct DisplayResponse {
    clock: String,
    #[serde(flatten)]
    state: DisplayState,
}

async fn display<T: Transport>(
    State((companion, config)): State<CompanionState<T>>,
) -> Json<DisplayResponse> {
    // ---
    let now = Utc::now().timestamp_millis();
    Json(DisplayResponse {
        clock: format_clock(now, offset_from_minutes(config.display_utc_offset_minutes)),
        state: companion.state(),
    })
}

/// Inbound push from the ingesting device.
async fn receive_push<T: Transport>(
    State((companion, _)): State<CompanionState<T>>,
    Json(reading): Json<Reading>,
) -> StatusCode {
    // ---
    debug!("POST {} - ts={}", PUSH_PATH, reading.timestamp);
    if companion.apply(reading) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

/// Someone asked for a resync: re-fetch from the delivery slot right away.
async fn sync_request<T: Transport>(
    State((companion, _)): State<CompanionState<T>>,
) -> Json<Option<Reading>> {
    // ---
    debug!("Sync request received, fetching glycemia");
    Json(companion.resync().await)
}
