//! HTTP gateway. Each role gets its own router; `main.rs` only picks one.

use std::sync::Arc;

use axum::Router;

use crate::companion::Companion;
use crate::config::DeviceRole;
use crate::service::IngestService;
use crate::sync::Transport;
use crate::Config;

mod companion;
mod glycemia;
mod health;
mod notifications;

// ---

/// Router of the ingesting device (phone).
pub fn ingest_router(service: Arc<IngestService>, config: Config) -> Router {
    // ---
    Router::new()
        .merge(notifications::router())
        .merge(glycemia::router())
        .merge(health::router(DeviceRole::Ingest))
        .with_state((service, config))
}

/// Router of the companion display (wrist).
pub fn companion_router<T: Transport>(companion: Arc<Companion<T>>, config: Config) -> Router {
    // ---
    Router::new()
        .merge(companion::router::<T>())
        .merge(health::router(DeviceRole::Companion))
        .with_state((companion, config))
}
