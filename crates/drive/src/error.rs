//! Error types for sync runs

/// Why a sync run ended before listing was exhausted
///
/// Per-document problems never show up here; they degrade that document to
/// a private access record instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Authentication against the drive service failed
    #[error("Failed to connect to drive service: {0:#}")]
    Connect(anyhow::Error),

    /// The cancellation callback asked the run to stop
    #[error("gdrive_doc_sync: Stop signal detected")]
    Cancelled,

    /// Listing documents failed
    #[error(transparent)]
    Upstream(anyhow::Error),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
