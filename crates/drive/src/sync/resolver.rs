//! Permission resolution: slim document in, access record out

use log::{debug, warn};
use std::borrow::Cow;

use super::{PermissionCache, PermissionFetch, PermissionSource};
use crate::config::DriveConfig;
use crate::models::{
    ExternalAccess, Permission, PermissionKind, PermissionPayload, PermissionRefs, SlimDocument,
};

/// Where a document's permission entries came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOrigin {
    /// Returned inline by the listing
    Embedded,
    /// Every referenced ID was already cached
    Cached,
    /// A full permission fetch was issued
    Fetched,
    /// Nothing to look up
    Unavailable,
}

/// Result of resolving one document
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub access: ExternalAccess,
    pub origin: PermissionOrigin,
    /// No permission entries were obtainable, so the document was made private
    pub fell_back: bool,
    /// Malformed entries left out of `access`
    pub skipped: usize,
}

/// Turns slim documents into access records, fetching permissions on cache
/// misses
pub struct PermissionResolver<'a, P: ?Sized> {
    source: &'a P,
    cache: &'a PermissionCache,
    config: &'a DriveConfig,
}

impl<'a, P: PermissionSource + ?Sized> PermissionResolver<'a, P> {
    pub fn new(source: &'a P, cache: &'a PermissionCache, config: &'a DriveConfig) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    /// Resolve a document to its access record. Never fails; anything that
    /// goes wrong degrades to a private record.
    pub fn resolve(&self, doc: &SlimDocument) -> ExternalAccess {
        self.resolve_detailed(doc).access
    }

    /// Like [`resolve`](Self::resolve), also reporting how the entries were obtained
    pub fn resolve_detailed(&self, doc: &SlimDocument) -> Resolution {
        let (permissions, origin): (Cow<'_, [Option<Permission>]>, _) = match &doc.payload {
            PermissionPayload::Embedded(entries) => {
                (Cow::Borrowed(entries.as_slice()), PermissionOrigin::Embedded)
            }
            PermissionPayload::Referenced(refs) => {
                let (entries, origin) = self.lookup(refs);
                (Cow::Owned(entries), origin)
            }
            PermissionPayload::None => {
                (Cow::Owned(Vec::new()), PermissionOrigin::Unavailable)
            }
        };

        let fell_back = permissions.is_empty();
        let (mut access, skipped) = if fell_back {
            warn!("No permissions found for document {}", doc.id.as_str());
            (ExternalAccess::private(), 0)
        } else {
            let (access, skipped) = classify(
                doc.id.as_str(),
                &permissions,
                self.config.company_domain.as_deref(),
            );
            warn_skipped(doc.id.as_str(), skipped, permissions.len());
            (access, skipped)
        };

        // Shared drive members inherit access to every file in the drive
        if let Some(drive_id) = &doc.drive_id {
            access.external_user_group_ids.insert(drive_id.clone());
        }

        Resolution {
            access,
            origin,
            fell_back,
            skipped,
        }
    }

    /// Serve referenced IDs from the cache, or fetch the full list
    fn lookup(&self, refs: &PermissionRefs) -> (Vec<Option<Permission>>, PermissionOrigin) {
        if refs.doc_id.as_str().is_empty() || refs.permission_ids.is_empty() {
            return (Vec::new(), PermissionOrigin::Unavailable);
        }

        if let Some(cached) = self.cache.get_all(&refs.permission_ids) {
            debug!(
                "All {} permissions for {} served from cache",
                cached.len(),
                refs.doc_id.as_str()
            );
            return (cached.into_iter().map(Some).collect(), PermissionOrigin::Cached);
        }

        let acting_identity = refs
            .owner_email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.config.primary_admin_email);

        let entries = match self.source.list_permissions(&refs.doc_id, acting_identity) {
            Ok(PermissionFetch::Found(entries)) => {
                let written = self.cache.insert_batch(entries.iter().flatten().cloned());
                debug!(
                    "Fetched {} permissions for {} as {} ({} cached)",
                    entries.len(),
                    refs.doc_id.as_str(),
                    acting_identity,
                    written
                );
                entries
            }
            Ok(PermissionFetch::NotFound) => {
                warn!(
                    "Document {} not found while listing permissions as {}",
                    refs.doc_id.as_str(),
                    acting_identity
                );
                Vec::new()
            }
            Ok(PermissionFetch::Forbidden) => {
                warn!(
                    "Access denied listing permissions for {} as {}",
                    refs.doc_id.as_str(),
                    acting_identity
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "Failed to fetch permissions for {}: {:#}",
                    refs.doc_id.as_str(),
                    e
                );
                Vec::new()
            }
        };

        (entries, PermissionOrigin::Fetched)
    }
}

/// Classify permission entries into users, groups and public visibility.
///
/// Malformed entries (absent, or a user/group grant without an email) are
/// skipped and reported once per document.
pub fn classify_permissions(
    doc_id: &str,
    permissions: &[Option<Permission>],
    company_domain: Option<&str>,
) -> ExternalAccess {
    let (access, skipped) = classify(doc_id, permissions, company_domain);
    warn_skipped(doc_id, skipped, permissions.len());
    access
}

/// Classification without diagnostics for skipped entries; returns the
/// number skipped
fn classify(
    doc_id: &str,
    permissions: &[Option<Permission>],
    company_domain: Option<&str>,
) -> (ExternalAccess, usize) {
    let company_domain = company_domain.filter(|d| !d.is_empty());
    let mut access = ExternalAccess::private();
    let mut skipped = 0usize;

    for permission in permissions {
        let Some(permission) = permission else {
            skipped += 1;
            continue;
        };

        match permission.kind {
            PermissionKind::User => match permission.email() {
                Some(email) => {
                    access.external_user_emails.insert(email.to_string());
                }
                None => skipped += 1,
            },
            PermissionKind::Group => match permission.email() {
                Some(email) => {
                    access.external_user_group_ids.insert(email.to_string());
                }
                None => skipped += 1,
            },
            PermissionKind::Domain => match company_domain {
                Some(company) if permission.domain.as_deref() == Some(company) => {
                    access.is_public = true;
                }
                Some(company) => warn!(
                    "Permission {} on {} is type domain but does not match company domain {}: {:?}",
                    permission.id.as_str(),
                    doc_id,
                    company,
                    permission.domain
                ),
                None => warn!(
                    "Ignoring domain permission {} on {}: no company domain configured",
                    permission.id.as_str(),
                    doc_id
                ),
            },
            PermissionKind::Anyone => access.is_public = true,
            PermissionKind::Unknown => debug!(
                "Ignoring permission {} of unknown type on {}",
                permission.id.as_str(),
                doc_id
            ),
        }
    }

    (access, skipped)
}

fn warn_skipped(doc_id: &str, skipped: usize, total: usize) {
    if skipped > 0 {
        warn!("Skipped {} permissions of {} for document {}", skipped, total, doc_id);
    }
}
