//! Configuration loading for the Drive connector
//!
//! Connector settings and Google credentials are loaded from (in order of
//! priority):
//! 1. An explicit file path (command line)
//! 2. JSON files in the permsync config directory
//! 3. Environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Connector settings filename in the config directory
const CONNECTOR_FILE: &str = "drive-connector.json";

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_page_size() -> usize {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Settings for one Drive connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Workspace admin used to list files, and as the acting identity for
    /// permission lookups on files without a known owner
    pub primary_admin_email: String,
    /// Company domain. Files shared with this domain are treated as public.
    #[serde(default)]
    pub company_domain: Option<String>,
    /// Files per listing page (one page is one sync batch)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl DriveConfig {
    pub fn new(primary_admin_email: impl Into<String>) -> Self {
        Self {
            primary_admin_email: primary_admin_email.into(),
            company_domain: None,
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn with_company_domain(mut self, domain: impl Into<String>) -> Self {
        self.company_domain = Some(domain.into());
        self
    }

    /// Load settings from the config directory, falling back to environment
    /// variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CONNECTOR_FILE) {
            let cfg: Self = config::load_json(CONNECTOR_FILE)?;
            return cfg.validated();
        }
        Self::from_env()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let cfg: Self = config::load_json_file(path)?;
        cfg.validated()
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("Failed to parse connector config")?;
        cfg.validated()
    }

    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let admin = std::env::var("PERMSYNC_PRIMARY_ADMIN_EMAIL")
            .context("PERMSYNC_PRIMARY_ADMIN_EMAIL environment variable not set")?;
        let mut cfg = Self::new(admin);
        cfg.company_domain = std::env::var("PERMSYNC_COMPANY_DOMAIN")
            .ok()
            .filter(|d| !d.is_empty());
        cfg.validated()
    }

    fn validated(mut self) -> Result<Self> {
        // A blank domain means no domain, whichever way it was loaded
        self.company_domain = self.company_domain.filter(|d| !d.trim().is_empty());
        if self.primary_admin_email.trim().is_empty() {
            anyhow::bail!("primary_admin_email must not be empty");
        }
        if self.page_size == 0 || self.page_size > 1000 {
            anyhow::bail!("page_size must be between 1 and 1000, got {}", self.page_size);
        }
        Ok(self)
    }

    /// Get the default connector config path
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONNECTOR_FILE)
    }
}

/// Google credentials, in the key-file format Google Cloud Console exports
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveCredentials {
    /// Service account with domain-wide delegation. Can act as any user.
    ServiceAccount(ServiceAccountKey),
    /// A single user's OAuth refresh token. Always acts as that user.
    AuthorizedUser(AuthorizedUserCredentials),
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for DriveCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .field("token_uri", &key.token_uri)
                .finish_non_exhaustive(),
            Self::AuthorizedUser(user) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &user.client_id)
                .finish_non_exhaustive(),
        }
    }
}

impl DriveCredentials {
    /// Load credentials from the config directory, falling back to the file
    /// named by `GOOGLE_APPLICATION_CREDENTIALS`
    pub fn load() -> Result<Self> {
        if config::config_exists(CREDENTIALS_FILE) {
            let creds: Self = config::load_json(CREDENTIALS_FILE)?;
            return Ok(creds);
        }

        let path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
            .context("No credentials file found and GOOGLE_APPLICATION_CREDENTIALS not set")?;
        Self::from_file(Path::new(&path))
    }

    /// Load credentials from a specific JSON key file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse credentials JSON")
    }

    /// Get the default credentials file path
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    /// Whether these credentials can impersonate other users
    pub fn supports_delegation(&self) -> bool {
        matches!(self, Self::ServiceAccount(_))
    }
}
