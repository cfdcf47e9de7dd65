//! Periodic TTL sweeper for expired sessions.
//!
//! Expired sessions are evicted without notifying bound peers; their next
//! event simply fails with `Session not found`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_SWEPT_TOTAL};
use crate::pairing::PairingRegistry;

/// Run the sweep loop until the token is cancelled.
pub async fn run_sweeper(
    registry: Arc<PairingRegistry>,
    ttl: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the immediate first tick
    let _ = ticker.tick().await;

    info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "session sweeper started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _ = sweep_once(&registry, ttl);
            }
            () = shutdown.cancelled() => {
                debug!("session sweeper stopping");
                break;
            }
        }
    }
}

/// One sweep pass. Returns the number of sessions evicted.
pub fn sweep_once(registry: &PairingRegistry, ttl: Duration) -> usize {
    let swept = registry.sweep_expired(Utc::now(), ttl);
    if !swept.is_empty() {
        info!(count = swept.len(), "swept expired sessions");
        counter!(SESSIONS_SWEPT_TOTAL).increment(swept.len() as u64);
    }
    #[allow(clippy::cast_precision_loss)]
    gauge!(SESSIONS_ACTIVE).set(registry.session_count() as f64);
    swept.len()
}
