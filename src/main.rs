//! Application entry point for the `glycemia-companion` service.
//!
//! One binary, two roles, chosen by `DEVICE_ROLE`:
//! - `ingest` (phone): receives notification payloads from the platform
//!   listener, parses and stores readings in SQLite, and pushes each accepted
//!   reading to the companion.
//! - `companion` (wrist): mirrors the ingest store through pushes and a
//!   periodic pull, and serves the derived display state.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the SQLite store and creating the schema (ingest only)
//! - Starting the propagation worker or the companion timers
//! - Mounting the role's routes and serving until Ctrl-C
//!
//! # Environment Variables
//! See [`glycemia_companion::config::load_from_env`] for the full list.
//! - `GLYCEMIA_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `GLYCEMIA_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, sync::Arc};

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use glycemia_companion::companion::Companion;
use glycemia_companion::config::{self, DeviceRole};
use glycemia_companion::routes;
use glycemia_companion::service::{IngestOptions, IngestService};
use glycemia_companion::storage::Storage;
use glycemia_companion::sync::{HttpTransport, Propagator};
use glycemia_companion::Config;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    match cfg.role {
        DeviceRole::Ingest => run_ingest(cfg).await,
        DeviceRole::Companion => run_companion(cfg).await,
    }
}

async fn run_ingest(cfg: Config) -> Result<()> {
    // ---
    tracing::info!("Opening glycemia store: {}", cfg.db_url);
    let storage = Storage::connect(&cfg.db_url, cfg.db_pool_max).await?;

    let mut transport = HttpTransport::new(cfg.transport_timeout)?;
    match &cfg.companion_url {
        Some(url) => transport = transport.with_companion(url),
        None => tracing::warn!("COMPANION_URL not set, readings stay on this device"),
    }
    let propagator = Propagator::spawn(Arc::new(transport), cfg.outbound_queue_depth);

    let options = IngestOptions {
        history_capacity: cfg.history_capacity,
        allow_shell_source: cfg.allow_shell_source,
    };
    let service = Arc::new(IngestService::restore(storage, propagator, options).await);

    let addr = cfg.listen_addr;
    let app = routes::ingest_router(Arc::clone(&service), cfg);

    tracing::info!("Ingest service listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await,
        Err(_) => tracing::warn!("Service still shared at exit, skipping final flush"),
    }
    Ok(())
}

async fn run_companion(cfg: Config) -> Result<()> {
    // ---
    let ingest_url = cfg
        .ingest_url
        .as_deref()
        .ok_or_else(|| anyhow!("INGEST_URL must be set for the companion role"))?;

    let transport = HttpTransport::new(cfg.transport_timeout)?.with_ingest(ingest_url);
    let companion = Arc::new(Companion::new(
        Arc::new(transport),
        cfg.companion_history_capacity,
    ));

    // Held for the lifetime of the server; dropping a handle stops its timer.
    let _poller = companion.start_polling(cfg.sync_poll);
    let _time_ago = companion.start_time_ago_refresh(cfg.time_ago_refresh);

    let addr = cfg.listen_addr;
    let app = routes::companion_router(companion, cfg);

    tracing::info!("Companion display listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `GLYCEMIA_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `GLYCEMIA_LOG_LEVEL` env var
///
/// Called once at startup, before any logging macro runs.
fn init_tracing() {
    // ---
    let span_events = match env::var("GLYCEMIA_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("GLYCEMIA_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
