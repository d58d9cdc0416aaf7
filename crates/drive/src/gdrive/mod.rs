//! Google Drive API integration
//!
//! This module provides:
//! - Token acquisition (service-account delegation or a user refresh token)
//! - Drive API client for listing files and permissions
//! - Response normalization to slim documents

mod auth;
mod client;
mod normalize;

pub use auth::DriveAuth;
pub use client::{DriveApiError, DriveClient};
pub use normalize::{normalize_file, normalize_permission};

/// Drive API response types
pub mod api {
    use serde::Deserialize;

    /// Response from listing files
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListFilesResponse {
        #[serde(default)]
        pub files: Vec<DriveFile>,
        pub next_page_token: Option<String>,
    }

    /// File with only the fields permission sync asks for
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DriveFile {
        pub id: String,
        /// Set for files in a shared drive
        pub drive_id: Option<String>,
        #[serde(default)]
        pub owners: Vec<Owner>,
        pub permission_ids: Option<Vec<String>>,
        /// Kept as raw JSON so one malformed entry doesn't sink the page
        pub permissions: Option<Vec<serde_json::Value>>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Owner {
        pub email_address: Option<String>,
    }

    /// Response from listing a file's permissions
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListPermissionsResponse {
        #[serde(default)]
        pub permissions: Vec<serde_json::Value>,
        pub next_page_token: Option<String>,
    }

    /// Permission resource as Drive returns it
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ApiPermission {
        pub id: Option<String>,
        #[serde(rename = "type")]
        pub kind: Option<String>,
        pub email_address: Option<String>,
        pub domain: Option<String>,
    }
}
