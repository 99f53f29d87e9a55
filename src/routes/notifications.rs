use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::display::{offset_from_minutes, ReadingView};
use crate::notification::{NotificationEnvelope, NotificationPayload};
use crate::service::IngestService;
use crate::Config;

// ---

pub fn router() -> Router<(Arc<IngestService>, Config)> {
    // ---
    Router::new().route("/notifications", post(handler))
}

/// Accepts either `{"notification": ...}` from a headless bridge or a bare payload.
fn payload_from(body: Value) -> Option<NotificationPayload> {
    // ---
    if body.get("notification").is_some() {
        serde_json::from_value::<NotificationEnvelope>(body)
            .ok()?
            .into_payload()
    } else {
        serde_json::from_value(body).ok()
    }
}

async fn handler(
    State((service, config)): State<(Arc<IngestService>, Config)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    // ---
    let Some(payload) = payload_from(body) else {
        debug!("POST /notifications - unusable payload");
        return StatusCode::NO_CONTENT.into_response();
    };

    match service.ingest(&payload) {
        Some(reading) => {
            let now = Utc::now().timestamp_millis();
            let offset = offset_from_minutes(config.display_utc_offset_minutes);
            (StatusCode::OK, Json(ReadingView::new(reading, now, offset))).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
