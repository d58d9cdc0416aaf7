//! Collaborator traits the sync engine is driven through
//!
//! [`DriveClient`](crate::gdrive::DriveClient) implements the source traits
//! against the real Drive API; tests implement them in memory.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{DocumentId, Permission, SlimDocument};

/// Lazy sequence of document batches, pulled one page at a time
pub type DocumentBatches = Box<dyn Iterator<Item = Result<Vec<SlimDocument>>> + Send>;

/// Lists documents changed in a time window
pub trait DocumentSource {
    /// Authenticate against the service. Called once, before listing.
    fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// List documents modified in `[since, until)`.
    ///
    /// Errors, whether returned here or yielded by the iterator, end the run.
    fn list_changed(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<DocumentBatches>;
}

/// Outcome of fetching one document's permission list
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionFetch {
    /// The complete permission list. `None` marks a malformed entry.
    Found(Vec<Option<Permission>>),
    /// The document no longer exists
    NotFound,
    /// The acting identity cannot read the document's permissions
    Forbidden,
}

/// Fetches the full permission list of a single document
pub trait PermissionSource {
    fn list_permissions(&self, doc_id: &DocumentId, acting_identity: &str) -> Result<PermissionFetch>;
}

/// Cancellation and progress hooks for a running sync
pub trait SyncCallback {
    /// Polled before each document is resolved
    fn should_stop(&self) -> bool;

    /// Called after each document is emitted
    fn progress(&self, label: &str, count: usize);
}

impl<T: DocumentSource + ?Sized> DocumentSource for &T {
    fn connect(&self) -> Result<()> {
        (**self).connect()
    }

    fn list_changed(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<DocumentBatches> {
        (**self).list_changed(since, until)
    }
}

impl<T: PermissionSource + ?Sized> PermissionSource for &T {
    fn list_permissions(&self, doc_id: &DocumentId, acting_identity: &str) -> Result<PermissionFetch> {
        (**self).list_permissions(doc_id, acting_identity)
    }
}
