//! Normalized access records produced by permission sync

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::DocumentId;

/// Who may see a document, expressed in external (Drive) identities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccess {
    pub external_user_emails: BTreeSet<String>,
    /// Group emails plus the shared drive ID, if any
    pub external_user_group_ids: BTreeSet<String>,
    pub is_public: bool,
}

impl ExternalAccess {
    /// No grants at all. Used whenever permissions cannot be determined.
    pub fn private() -> Self {
        Self::default()
    }

    /// True if nobody outside the owner would be granted access
    pub fn grants_nothing(&self) -> bool {
        !self.is_public
            && self.external_user_emails.is_empty()
            && self.external_user_group_ids.is_empty()
    }
}

/// Access record for one document, handed to the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocExternalAccess {
    pub doc_id: DocumentId,
    pub external_access: ExternalAccess,
}

impl DocExternalAccess {
    pub fn new(doc_id: DocumentId, external_access: ExternalAccess) -> Self {
        Self {
            doc_id,
            external_access,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_grants_nothing() {
        let access = ExternalAccess::private();
        assert!(access.grants_nothing());
        assert!(!access.is_public);
    }

    #[test]
    fn test_serialization_shape() {
        let mut access = ExternalAccess::private();
        access.external_user_emails.insert("u@x.com".to_string());
        let record = DocExternalAccess::new(DocumentId::new("d1"), access);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["doc_id"], "d1");
        assert_eq!(json["external_access"]["external_user_emails"][0], "u@x.com");
        assert_eq!(json["external_access"]["is_public"], false);
    }
}
