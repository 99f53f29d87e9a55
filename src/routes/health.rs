// src/routes/health.rs
//! Liveness endpoint shared by both roles.
//!
//! `GET /health` answers without touching the store, the database or the
//! companion link, and reports which role the process runs as so a probe can
//! tell the phone and wrist services apart.

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::config::DeviceRole;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    role: &'static str,
}

fn role_name(role: DeviceRole) -> &'static str {
    match role {
        DeviceRole::Ingest => "ingest",
        DeviceRole::Companion => "companion",
    }
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges into either role's router.
pub fn router<S>(role: DeviceRole) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let role = role_name(role);
    Router::new().route(
        "/health",
        get(move || async move { Json(HealthResponse { status: "ok", role }) }),
    )
}
