//! Drive crate - permission sync for Google Drive documents
//!
//! This crate provides the logic for mirroring Drive sharing rules into a
//! search platform's access model:
//! - Domain models (SlimDocument, Permission, ExternalAccess)
//! - Drive API client and service-account authentication
//! - Permission cache shared across documents and runs
//! - Permission resolver classifying grants into users, groups and public
//! - Cancellable, lazily streamed sync of changed documents
//!
//! The engine talks to Drive only through the [`DocumentSource`] and
//! [`PermissionSource`] traits, so it can be driven by in-memory fakes.

pub mod config;
pub mod error;
pub mod gdrive;
pub mod models;
pub mod sync;

pub use crate::config::{AuthorizedUserCredentials, DriveConfig, DriveCredentials, ServiceAccountKey};
pub use error::SyncError;
pub use gdrive::{DriveApiError, DriveAuth, DriveClient};
pub use models::{
    DocExternalAccess, DocumentId, ExternalAccess, Permission, PermissionId, PermissionKind,
    PermissionPayload, PermissionRefs, SlimDocument, SyncScope, SyncState,
};
pub use sync::{
    // Sync execution
    DocSync, RunState, SyncStats, doc_sync, PROGRESS_LABEL,
    // Resolution (for callers resolving single documents)
    PermissionCache, PermissionOrigin, PermissionResolver, Resolution, classify_permissions,
    // Collaborator seams
    DocumentBatches, DocumentSource, PermissionFetch, PermissionSource, SyncCallback,
    // Window computation
    SyncWindow, sync_window,
};
