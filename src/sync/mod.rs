//! Cross-device propagation of accepted readings.
//!
//! The ingesting device pushes each accepted reading through a one-way,
//! best-effort queue ([`Propagator`]). Nothing is acknowledged or retried:
//! the companion polls the shared delivery slot on an interval and also
//! re-fetches on an explicit sync request, which repairs any lost push.

mod propagator;
mod transport;

pub use propagator::Propagator;
pub use transport::{HttpTransport, MemoryTransport, Transport};

/// Path of the companion endpoint receiving pushed readings.
pub const PUSH_PATH: &str = "/sync/push";

/// Path of the ingest endpoint exposing the last delivered reading.
pub const LATEST_PATH: &str = "/sync/latest";

/// Path of the companion endpoint that triggers an immediate re-fetch.
pub const SYNC_REQUEST_PATH: &str = "/sync/request";
