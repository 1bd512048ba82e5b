//! Emergency exit sequencing

use memwatch::journal::Journal;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Drain the journal and hold the process for the rest of the grace period.
///
/// `requested_at` is when the emergency shutdown was received. Returns
/// whether everything queued before the call reached disk.
pub async fn settle_emergency(journal: &Journal, grace: Duration, requested_at: Instant) -> bool {
    let deadline = requested_at + grace;

    let flushed = match tokio::time::timeout_at(deadline, journal.flush()).await {
        Ok(Ok(())) => {
            info!(root = %journal.root().display(), "Journal flushed before exit");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Journal flush failed before exit");
            false
        }
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "Journal not flushed within grace period");
            false
        }
    };

    tokio::time::sleep_until(deadline).await;
    flushed
}
