//! Slim document model: just enough of a Drive file to resolve its access

use serde::{Deserialize, Serialize};

use super::{Permission, PermissionId};

/// Unique identifier for a document (Drive file ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Permission references that need a lookup before they can be classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRefs {
    /// File whose permission list to fetch on a cache miss
    pub doc_id: DocumentId,
    pub permission_ids: Vec<PermissionId>,
    /// Owner of the file, used as the acting identity for the fetch
    pub owner_email: Option<String>,
}

/// Permission data carried by a slim document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PermissionPayload {
    /// Full permission entries returned inline by the listing.
    /// `None` marks an entry that was present but malformed.
    Embedded(Vec<Option<Permission>>),
    /// Only permission IDs were returned (typical for shared drive files)
    Referenced(PermissionRefs),
    /// The listing carried no permission data at all
    None,
}

/// Lightweight descriptor of a Drive file used to drive permission sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlimDocument {
    pub id: DocumentId,
    pub payload: PermissionPayload,
    /// Shared drive containing the file. Members of the shared drive can see
    /// the file, so the drive ID is treated as a group grant.
    pub drive_id: Option<String>,
}

impl SlimDocument {
    /// Document whose permissions came back inline
    pub fn embedded(id: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self::embedded_raw(id, permissions.into_iter().map(Some).collect())
    }

    /// Document whose inline permissions may contain malformed entries
    pub fn embedded_raw(id: impl Into<String>, permissions: Vec<Option<Permission>>) -> Self {
        Self {
            id: DocumentId::new(id),
            payload: PermissionPayload::Embedded(permissions),
            drive_id: None,
        }
    }

    /// Document that only references permission IDs
    pub fn referenced<I, P>(id: impl Into<String>, permission_ids: I, owner_email: Option<&str>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PermissionId>,
    {
        let id = DocumentId::new(id);
        Self {
            payload: PermissionPayload::Referenced(PermissionRefs {
                doc_id: id.clone(),
                permission_ids: permission_ids.into_iter().map(Into::into).collect(),
                owner_email: owner_email.map(str::to_string),
            }),
            id,
            drive_id: None,
        }
    }

    /// Document without any permission data
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(id),
            payload: PermissionPayload::None,
            drive_id: None,
        }
    }

    /// Set the shared drive containing this document
    pub fn with_drive_id(mut self, drive_id: impl Into<String>) -> Self {
        self.drive_id = Some(drive_id.into());
        self
    }
}
