//! Sync window computation
//!
//! Pure functions that can be tested without a Drive connection.

use chrono::{DateTime, Utc};

/// Half-open range `[start, end)` of file modification times a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// True if no modification time can fall inside the window
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Compute the window for a run starting at `now`.
///
/// # Arguments
/// * `last_perm_sync_at` - Watermark of the previous successful run (None if never synced)
/// * `now` - Current time; becomes the next watermark if this run succeeds
pub fn sync_window(last_perm_sync_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> SyncWindow {
    SyncWindow {
        start: last_perm_sync_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        end: now,
    }
}
