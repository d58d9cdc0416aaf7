//! Domain models for permission sync

mod access;
mod document;
mod permission;
mod sync_state;

pub use access::{DocExternalAccess, ExternalAccess};
pub use document::{DocumentId, PermissionPayload, PermissionRefs, SlimDocument};
pub use permission::{Permission, PermissionId, PermissionKind};
pub use sync_state::{SyncScope, SyncState};
