//! Glycemia notification ingest and companion display sync.
//!
//! The pure core turns vendor notification text into a validated [`Reading`]
//! ([`parser`], [`source`], [`notification`]), classifies it ([`glycemia`]) and
//! keeps a bounded, deduplicated history ([`history`]). Around it sit the
//! ingest service with its SQLite slots ([`service`], [`storage`]), the
//! best-effort propagation channel ([`sync`]) and the companion mirror
//! ([`companion`]), exposed over HTTP by [`routes`].

pub mod companion;
pub mod config;
pub mod display;
pub mod glycemia;
pub mod history;
pub mod models;
pub mod notification;
pub mod parser;
pub mod routes;
pub mod schema;
pub mod service;
pub mod source;
pub mod storage;
pub mod sync;

pub use config::Config;

// Re-exported so routes/*.rs and downstream callers only need the crate root.
pub use models::{GlycemiaUnit, Reading};
