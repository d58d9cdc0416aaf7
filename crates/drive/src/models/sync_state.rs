//! Sync state tracking for incremental permission sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DriveConfig, DriveCredentials};
use crate::sync::{SyncWindow, sync_window};

/// Persisted watermark for one Drive connection
///
/// Only one SyncState per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Connection identifier (the primary admin email)
    pub connection_id: String,
    /// Upper bound of the last successful permission sync window
    pub last_perm_sync_at: Option<DateTime<Utc>>,
    /// Schema version for migrations
    pub sync_version: u32,
}

impl SyncState {
    /// State for a connection that has never synced
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            last_perm_sync_at: None,
            sync_version: 1,
        }
    }

    /// Record a successful sync whose window ended at `at`
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_perm_sync_at = Some(at);
        self
    }
}

/// Everything one sync run needs to know about its connection
#[derive(Debug, Clone)]
pub struct SyncScope {
    pub config: DriveConfig,
    pub credentials: DriveCredentials,
    /// Prior sync watermark; `None` syncs everything
    pub last_perm_sync_at: Option<DateTime<Utc>>,
}

impl SyncScope {
    pub fn new(config: DriveConfig, credentials: DriveCredentials) -> Self {
        Self {
            config,
            credentials,
            last_perm_sync_at: None,
        }
    }

    /// Resume from a stored sync state
    pub fn with_state(mut self, state: Option<&SyncState>) -> Self {
        self.last_perm_sync_at = state.and_then(|s| s.last_perm_sync_at);
        self
    }

    /// Half-open window of modification times this run covers
    pub fn window(&self, now: DateTime<Utc>) -> SyncWindow {
        sync_window(self.last_perm_sync_at, now)
    }
}
