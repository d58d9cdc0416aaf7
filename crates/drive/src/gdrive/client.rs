//! Drive API HTTP client
//!
//! Provides paginated file and permission listing against the Drive v3 API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::api::{ListFilesResponse, ListPermissionsResponse};
use super::{DriveAuth, normalize_file, normalize_permission};
use crate::config::{DriveConfig, DriveCredentials};
use crate::models::{DocumentId, SlimDocument, SyncScope};
use crate::sync::{DocumentBatches, DocumentSource, PermissionFetch, PermissionSource};

/// Error from a single Drive API request
#[derive(Debug, thiserror::Error)]
pub enum DriveApiError {
    /// The API answered with a non-success status
    #[error("Drive API returned HTTP {0}")]
    Status(u16),

    /// The request never got an answer (connection, TLS, timeout)
    #[error("Drive API request failed")]
    Transport(#[from] ureq::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriveApiError {
    /// Whether repeating the request could succeed
    fn is_retryable(&self) -> bool {
        match self {
            // 401 is retried once the rejected token has been dropped
            Self::Status(code) => matches!(*code, 401 | 429 | 500..=599),
            Self::Transport(_) => true,
            Self::Other(_) => false,
        }
    }
}

/// Drive API client for listing files and their permissions
#[derive(Clone)]
pub struct DriveClient {
    auth: Arc<DriveAuth>,
    agent: ureq::Agent,
    primary_admin_email: String,
    page_size: usize,
}

impl DriveClient {
    /// Drive API base URL
    const BASE_URL: &'static str = "https://www.googleapis.com/drive/v3";

    const FILE_FIELDS: &'static str = "nextPageToken,files(id,driveId,owners(emailAddress),permissionIds,permissions(id,emailAddress,type,domain))";
    const PERMISSION_FIELDS: &'static str = "nextPageToken,permissions(id,emailAddress,type,domain)";

    /// Permissions per page; the API maximum
    const PERMISSION_PAGE_SIZE: usize = 100;

    const MAX_ATTEMPTS: u32 = 3;

    /// Create a new Drive client
    pub fn new(credentials: DriveCredentials, config: &DriveConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.request_timeout_secs)))
            .build()
            .into();
        let auth = DriveAuth::new(credentials, agent.clone());

        Self {
            auth: Arc::new(auth),
            agent,
            primary_admin_email: config.primary_admin_email.clone(),
            page_size: config.page_size,
        }
    }

    /// Create a client for the connection described by `scope`
    pub fn from_scope(scope: &SyncScope) -> Self {
        Self::new(scope.credentials.clone(), &scope.config)
    }

    /// List one page of files modified in `[since, until)`, acting as the
    /// primary admin
    ///
    /// # Arguments
    /// * `page_token` - Optional page token for pagination
    pub fn list_files(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<ListFilesResponse> {
        let mut url = format!(
            "{}/files?corpora=allDrives&includeItemsFromAllDrives=true&supportsAllDrives=true&pageSize={}&q={}&fields={}",
            Self::BASE_URL,
            self.page_size,
            urlencoding::encode(&modified_query(since, until)),
            urlencoding::encode(Self::FILE_FIELDS),
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        self.get_json_with_retry(&url, &self.primary_admin_email)
            .context("Failed to list files")
    }

    /// List one page of a file's permissions, acting as `acting_identity`
    pub fn list_permissions_page(
        &self,
        file_id: &str,
        acting_identity: &str,
        page_token: Option<&str>,
    ) -> Result<ListPermissionsResponse, DriveApiError> {
        let mut url = format!(
            "{}/files/{}/permissions?supportsAllDrives=true&pageSize={}&fields={}",
            Self::BASE_URL,
            urlencoding::encode(file_id),
            Self::PERMISSION_PAGE_SIZE,
            urlencoding::encode(Self::PERMISSION_FIELDS),
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        self.get_json_with_retry(url.as_str(), acting_identity)
    }

    /// GET a JSON resource with exponential backoff retry
    fn get_json_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        subject: &str,
    ) -> Result<T, DriveApiError> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            match self.get_json(url, subject) {
                Err(e) if attempt < Self::MAX_ATTEMPTS && e.is_retryable() => {
                    debug!("Drive request failed (attempt {}): {}, retrying", attempt, e);
                    // Add jitter to delay
                    let jitter = Duration::from_millis(rand_jitter());
                    std::thread::sleep(delay + jitter);
                    delay *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, subject: &str) -> Result<T, DriveApiError> {
        let access_token = self.auth.access_token(subject)?;

        let response = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call();

        match response {
            Ok(mut resp) => resp
                .body_mut()
                .read_json()
                .map_err(|e| {
                    DriveApiError::Other(
                        anyhow::Error::new(e).context("Failed to parse Drive API response"),
                    )
                }),
            Err(ureq::Error::StatusCode(401)) => {
                self.auth.invalidate(subject);
                Err(DriveApiError::Status(401))
            }
            Err(ureq::Error::StatusCode(code)) => Err(DriveApiError::Status(code)),
            Err(e) => Err(e.into()),
        }
    }
}

impl DocumentSource for DriveClient {
    fn connect(&self) -> Result<()> {
        self.auth
            .access_token(&self.primary_admin_email)
            .with_context(|| format!("Failed to authenticate as {}", self.primary_admin_email))?;
        Ok(())
    }

    fn list_changed(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<DocumentBatches> {
        Ok(Box::new(FilePages {
            client: self.clone(),
            since,
            until,
            page_token: None,
            done: false,
        }))
    }
}

impl PermissionSource for DriveClient {
    /// Fetch every page of a file's permissions.
    ///
    /// 404 and 403 at any page mean the file is gone or hidden from the
    /// acting identity; they are reported as outcomes, not errors.
    fn list_permissions(&self, doc_id: &DocumentId, acting_identity: &str) -> Result<PermissionFetch> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = match self.list_permissions_page(doc_id.as_str(), acting_identity, page_token.as_deref()) {
                Ok(page) => page,
                Err(DriveApiError::Status(404)) => return Ok(PermissionFetch::NotFound),
                Err(DriveApiError::Status(403)) => return Ok(PermissionFetch::Forbidden),
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to list permissions for {}", doc_id.as_str())));
                }
            };

            entries.extend(page.permissions.iter().map(normalize_permission));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(PermissionFetch::Found(entries))
    }
}

/// Lazily pulls one page of changed files per batch
struct FilePages {
    client: DriveClient,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    page_token: Option<String>,
    done: bool,
}

impl Iterator for FilePages {
    type Item = Result<Vec<SlimDocument>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let page = match self
            .client
            .list_files(self.since, self.until, self.page_token.as_deref())
        {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        self.page_token = page.next_page_token;
        self.done = self.page_token.is_none();
        Some(Ok(page.files.into_iter().map(normalize_file).collect()))
    }
}

/// Drive search query selecting files modified in `[since, until)`
fn modified_query(since: DateTime<Utc>, until: DateTime<Utc>) -> String {
    format!(
        "modifiedTime >= '{}' and modifiedTime < '{}' and trashed = false",
        since.to_rfc3339_opts(SecondsFormat::Millis, true),
        until.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
