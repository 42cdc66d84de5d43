//! OAuth2 access tokens for a service account
//!
//! Signs an RS256 JWT assertion with the service-account key and exchanges it
//! at the token endpoint. The token is cached until shortly before expiry.

use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::credentials::ServiceAccountKey;
use crate::PersistenceError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
pub(crate) struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Issues and caches access tokens for one service account
pub struct TokenProvider {
    http: Client,
    client_email: String,
    encoding_key: EncodingKey,
    token_uri: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        http: Client,
        key: &ServiceAccountKey,
        token_uri: impl Into<String>,
    ) -> Result<Self, PersistenceError> {
        key.validate()?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| PersistenceError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            http,
            client_email: key.client_email.clone(),
            encoding_key,
            token_uri: key.token_uri.clone().unwrap_or_else(|| token_uri.into()),
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Current access token, exchanging a fresh assertion when needed
    pub async fn access_token(&self) -> Result<String, PersistenceError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *self.cached.lock() = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call re-authenticates
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn cached_token(&self) -> Option<String> {
        let cached = self.cached.lock();
        cached
            .as_ref()
            .filter(|c| c.expires_at > Instant::now() + EXPIRY_MARGIN)
            .map(|c| c.token.clone())
    }

    pub(crate) fn assertion(&self, now: i64) -> Result<String, PersistenceError> {
        let claims = Claims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| PersistenceError::Auth(format!("failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<CachedToken, PersistenceError> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Auth(format!(
                "token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PersistenceError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            client_email = %self.client_email,
            expires_in = token.expires_in,
            "Obtained access token"
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}
