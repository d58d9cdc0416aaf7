//! Drive API response normalization
//!
//! Converts Drive API responses to slim documents and permissions.

use super::api::{ApiPermission, DriveFile};
use crate::models::{
    DocumentId, Permission, PermissionId, PermissionKind, PermissionPayload, PermissionRefs,
    SlimDocument,
};

/// Normalize one raw permission entry.
///
/// Returns `None` for entries that are null, empty, or missing their ID or
/// type; the resolver counts those as skipped.
pub fn normalize_permission(raw: &serde_json::Value) -> Option<Permission> {
    if !raw.as_object().is_some_and(|o| !o.is_empty()) {
        return None;
    }

    let api: ApiPermission = serde_json::from_value(raw.clone()).ok()?;
    let id = api.id.filter(|id| !id.is_empty())?;
    let kind = api.kind.filter(|k| !k.is_empty())?;

    Some(Permission {
        id: PermissionId::new(id),
        kind: PermissionKind::parse(&kind),
        email_address: api.email_address,
        domain: api.domain,
    })
}

/// Normalize a listed file to a slim document
///
/// Inline permissions win. Files that only carry permission IDs (shared
/// drive files) become references resolved later, acting as the first owner.
pub fn normalize_file(file: DriveFile) -> SlimDocument {
    let id = DocumentId::new(file.id);

    let payload = match (file.permissions, file.permission_ids) {
        (Some(raw), _) if !raw.is_empty() => {
            PermissionPayload::Embedded(raw.iter().map(normalize_permission).collect())
        }
        (_, Some(ids)) if !ids.is_empty() => PermissionPayload::Referenced(PermissionRefs {
            doc_id: id.clone(),
            permission_ids: ids.into_iter().map(PermissionId::from).collect(),
            owner_email: file
                .owners
                .into_iter()
                .find_map(|o| o.email_address.filter(|e| !e.is_empty())),
        }),
        _ => PermissionPayload::None,
    };

    SlimDocument {
        id,
        payload,
        drive_id: file.drive_id.filter(|d| !d.is_empty()),
    }
}
