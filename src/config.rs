//! Configuration loader for the `glycemia-companion` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Result};

use crate::history::{COMPANION_HISTORY_CAPACITY, INGEST_HISTORY_CAPACITY};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean environment variable (`1|true|yes` / `0|false|no`).
macro_rules! parse_env_bool {
    ($var_name:expr, $default:expr) => {
        match env::var($var_name).ok().as_deref().map(str::trim) {
            None | Some("") => $default,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => bail!("Invalid {}: {:?}", $var_name, other),
        }
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Which side of the link this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    /// Phone: receives notifications, owns the canonical store.
    Ingest,
    /// Wrist display: mirrors the ingest store over the sync channel.
    Companion,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    pub role: DeviceRole,

    /// HTTP bind address.
    pub listen_addr: SocketAddr,

    /// SQLite connection string for the ingest store.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// History depth on the ingest side.
    pub history_capacity: usize,

    /// History depth on the companion side.
    pub companion_history_capacity: usize,

    /// Companion base URL the ingest side pushes to.
    pub companion_url: Option<String>,

    /// Ingest base URL the companion pulls from.
    pub ingest_url: Option<String>,

    /// Companion resync poll interval.
    pub sync_poll: Duration,

    /// Companion relative-time refresh interval.
    pub time_ago_refresh: Duration,

    /// Per-request timeout of the HTTP transport.
    pub transport_timeout: Duration,

    /// Depth of the outbound propagation queue.
    pub outbound_queue_depth: usize,

    /// Accept notifications posted from the developer shell.
    pub allow_shell_source: bool,

    /// Offset used for absolute time strings, minutes east of UTC.
    pub display_utc_offset_minutes: i32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `INGEST_URL` – only for `DEVICE_ROLE=companion`
///
/// Optional:
/// - `DEVICE_ROLE` – `ingest` or `companion` (default: ingest)
/// - `LISTEN_ADDR` – bind address (default: 0.0.0.0:8080)
/// - `DATABASE_URL` – SQLite URL (default: sqlite://glycemia.db?mode=rwc)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `HISTORY_CAPACITY` / `COMPANION_HISTORY_CAPACITY` (default: 20 / 48)
/// - `COMPANION_URL` – push target of the ingest side
/// - `SYNC_POLL_SECS` / `TIME_AGO_REFRESH_SECS` (default: 15 / 30)
/// - `TRANSPORT_TIMEOUT_MS` (default: 5000), `OUTBOUND_QUEUE_DEPTH` (default: 16)
/// - `ALLOW_SHELL_SOURCE` (default: false), `DISPLAY_UTC_OFFSET_MINUTES` (default: 0)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let role = match env::var("DEVICE_ROLE").ok().as_deref().map(str::trim) {
        None | Some("") | Some("ingest") => DeviceRole::Ingest,
        Some("companion") => DeviceRole::Companion,
        Some(other) => bail!("Invalid DEVICE_ROLE: {:?}", other),
    };

    let ingest_url = match role {
        DeviceRole::Companion => Some(require_env!("INGEST_URL")),
        DeviceRole::Ingest => env::var("INGEST_URL").ok(),
    };

    let listen_addr = parse_env!("LISTEN_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://glycemia.db?mode=rwc".into());
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let history_capacity = parse_env!("HISTORY_CAPACITY", usize, INGEST_HISTORY_CAPACITY);
    let companion_history_capacity =
        parse_env!("COMPANION_HISTORY_CAPACITY", usize, COMPANION_HISTORY_CAPACITY);
    let companion_url = env::var("COMPANION_URL").ok().filter(|u| !u.trim().is_empty());
    let sync_poll_secs = parse_env!("SYNC_POLL_SECS", u64, 15);
    let time_ago_refresh_secs = parse_env!("TIME_AGO_REFRESH_SECS", u64, 30);
    let transport_timeout_ms = parse_env!("TRANSPORT_TIMEOUT_MS", u64, 5000);
    let outbound_queue_depth = parse_env!("OUTBOUND_QUEUE_DEPTH", usize, 16);
    let allow_shell_source = parse_env_bool!("ALLOW_SHELL_SOURCE", false);
    let display_utc_offset_minutes = parse_env!("DISPLAY_UTC_OFFSET_MINUTES", i32, 0);

    if sync_poll_secs == 0 || time_ago_refresh_secs == 0 {
        bail!("SYNC_POLL_SECS and TIME_AGO_REFRESH_SECS must be greater than zero");
    }

    Ok(Config {
        role,
        listen_addr,
        db_url,
        db_pool_max,
        history_capacity,
        companion_history_capacity,
        companion_url,
        ingest_url,
        sync_poll: Duration::from_secs(sync_poll_secs),
        time_ago_refresh: Duration::from_secs(time_ago_refresh_secs),
        transport_timeout: Duration::from_millis(transport_timeout_ms),
        outbound_queue_depth,
        allow_shell_source,
        display_utc_offset_minutes,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DEVICE_ROLE          : {:?}", self.role);
        tracing::info!("  LISTEN_ADDR          : {}", self.listen_addr);
        match self.role {
            DeviceRole::Ingest => {
                tracing::info!("  DATABASE_URL         : {}", self.db_url);
                tracing::info!("  DB_POOL_MAX          : {}", self.db_pool_max);
                tracing::info!("  HISTORY_CAPACITY     : {}", self.history_capacity);
                tracing::info!("  COMPANION_URL        : {:?}", self.companion_url);
                tracing::info!("  OUTBOUND_QUEUE_DEPTH : {}", self.outbound_queue_depth);
                tracing::info!("  ALLOW_SHELL_SOURCE   : {}", self.allow_shell_source);
            }
            DeviceRole::Companion => {
                tracing::info!("  INGEST_URL           : {:?}", self.ingest_url);
                tracing::info!("  HISTORY_CAPACITY     : {}", self.companion_history_capacity);
                tracing::info!("  SYNC_POLL            : {:?}", self.sync_poll);
                tracing::info!("  TIME_AGO_REFRESH     : {:?}", self.time_ago_refresh);
            }
        }
        tracing::info!("  TRANSPORT_TIMEOUT    : {:?}", self.transport_timeout);
        tracing::info!("  DISPLAY_UTC_OFFSET   : {}min", self.display_utc_offset_minutes);
    }
}
