//! Permission sync engine
//!
//! Resolves access records for changed documents. Per-document problems
//! degrade to private records; only cancellation and listing failures end a
//! run early.

mod cache;
mod doc_sync;
mod resolver;
mod source;
mod window;

pub use cache::PermissionCache;
pub use doc_sync::{DocSync, PROGRESS_LABEL, RunState, SyncStats, doc_sync};
pub use resolver::{PermissionOrigin, PermissionResolver, Resolution, classify_permissions};
pub use source::{DocumentBatches, DocumentSource, PermissionFetch, PermissionSource, SyncCallback};
pub use window::{SyncWindow, sync_window};
