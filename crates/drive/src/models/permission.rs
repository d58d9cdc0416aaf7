//! Permission model representing one Drive sharing grant

use serde::{Deserialize, Serialize};

/// Unique identifier for a permission (Drive permission ID)
///
/// Drive reuses the same permission ID for the same grantee across files,
/// which is what makes caching by ID worthwhile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionId(pub String);

impl PermissionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PermissionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PermissionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who a permission grants access to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    User,
    Group,
    Domain,
    Anyone,
    /// A grantee type this crate does not understand
    #[serde(other)]
    Unknown,
}

impl PermissionKind {
    /// Parse the Drive `type` field
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => Self::User,
            "group" => Self::Group,
            "domain" => Self::Domain,
            "anyone" => Self::Anyone,
            _ => Self::Unknown,
        }
    }
}

/// A single sharing grant on a Drive file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    #[serde(rename = "type")]
    pub kind: PermissionKind,
    /// Set for `user` and `group` grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// Set for `domain` grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Permission {
    pub fn user(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(id),
            kind: PermissionKind::User,
            email_address: Some(email.into()),
            domain: None,
        }
    }

    pub fn group(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(id),
            kind: PermissionKind::Group,
            email_address: Some(email.into()),
            domain: None,
        }
    }

    pub fn domain(id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(id),
            kind: PermissionKind::Domain,
            email_address: None,
            domain: Some(domain.into()),
        }
    }

    pub fn anyone(id: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(id),
            kind: PermissionKind::Anyone,
            email_address: None,
            domain: None,
        }
    }

    /// Email address, treating an empty string as absent
    pub fn email(&self) -> Option<&str> {
        self.email_address.as_deref().filter(|e| !e.is_empty())
    }
}
