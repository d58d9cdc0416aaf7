//! Google OAuth2 token acquisition for the Drive API
//!
//! Service accounts use the JWT bearer grant with domain-wide delegation, so
//! one key can act as any user in the workspace. Authorized-user credentials
//! exchange their refresh token and always act as that one user.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::config::{AuthorizedUserCredentials, DriveCredentials, ServiceAccountKey};

/// Access token cached per acting identity
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Claims of the signed assertion exchanged for a delegated token
#[derive(Debug, Serialize)]
struct DelegationClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Token provider for Drive API calls
pub struct DriveAuth {
    credentials: DriveCredentials,
    agent: ureq::Agent,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl DriveAuth {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    const JWT_BEARER_GRANT: &'static str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

    /// Read-only access is all permission sync needs
    const DRIVE_READONLY_SCOPE: &'static str = "https://www.googleapis.com/auth/drive.readonly";

    /// Refresh tokens this long before they expire
    const EXPIRY_MARGIN_SECS: i64 = 300;
    const ASSERTION_LIFETIME_SECS: i64 = 3600;

    pub fn new(credentials: DriveCredentials, agent: ureq::Agent) -> Self {
        Self {
            credentials,
            agent,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Get a valid access token acting as `subject`, fetching a new one if
    /// the cached token is missing or about to expire
    pub fn access_token(&self, subject: &str) -> Result<String> {
        let key = self.cache_key(subject);
        let now = Utc::now().timestamp();

        {
            let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = tokens.get(&key)
                && token.expires_at > now + Self::EXPIRY_MARGIN_SECS
            {
                return Ok(token.access_token.clone());
            }
        }

        let response = match &self.credentials {
            DriveCredentials::ServiceAccount(sa) => self.delegated_token(sa, subject)?,
            DriveCredentials::AuthorizedUser(user) => self.refresh_access_token(user)?,
        };

        let expires_in = response
            .expires_in
            .map(|s| s as i64)
            .unwrap_or(Self::ASSERTION_LIFETIME_SECS);
        let cached = CachedToken {
            access_token: response.access_token.clone(),
            expires_at: now + expires_in,
        };
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, cached);

        Ok(response.access_token)
    }

    /// Drop the cached token for `subject`, e.g. after the API rejected it
    pub fn invalidate(&self, subject: &str) {
        let key = self.cache_key(subject);
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    /// Authorized-user tokens are the same whoever we claim to act as
    fn cache_key(&self, subject: &str) -> String {
        match &self.credentials {
            DriveCredentials::ServiceAccount(_) => subject.to_string(),
            DriveCredentials::AuthorizedUser(_) => String::new(),
        }
    }

    /// Exchange a signed assertion for a token impersonating `subject`
    fn delegated_token(&self, key: &ServiceAccountKey, subject: &str) -> Result<TokenResponse> {
        let assertion = Self::sign_assertion(key, subject, Utc::now().timestamp())?;

        debug!("Requesting delegated Drive token for {}", subject);
        let mut response = self
            .agent
            .post(&key.token_uri)
            .send_form([
                ("grant_type", Self::JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .with_context(|| format!("Failed to obtain delegated token for {}", subject))?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse delegated token response")
    }

    fn sign_assertion(key: &ServiceAccountKey, subject: &str, now: i64) -> Result<String> {
        let claims = DelegationClaims {
            iss: &key.client_email,
            sub: subject,
            scope: Self::DRIVE_READONLY_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + Self::ASSERTION_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Failed to parse service account private key")?;
        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .context("Failed to sign service account assertion")
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, user: &AuthorizedUserCredentials) -> Result<TokenResponse> {
        let response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("client_id", user.client_id.as_str()),
                ("client_secret", user.client_secret.as_str()),
                ("refresh_token", user.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")
    }
}
