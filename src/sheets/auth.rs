//! Service account authentication for the Sheets API.
//!
//! Google service accounts authenticate with the OAuth2 JWT-bearer grant: a short lived
//! assertion is signed with the account's private key and exchanged for an access token.
//! Access tokens are cached until shortly before they expire.

use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{SinkError, SinkResult, UpstreamError};

/// Read/write access to spreadsheets, nothing else.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

// ###################################
// ->   CREDENTIALS
// ###################################
/// Where the service account key comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Inline(SecretString),
    File(PathBuf),
}

impl CredentialSource {
    pub async fn load(&self) -> SinkResult<ServiceAccountKey> {
        let raw = match self {
            Self::Inline(json) => json.clone(),
            Self::File(path) => tokio::fs::read_to_string(path)
                .await
                .map(SecretString::from)
                .map_err(|er| {
                    SinkError::Credentials(format!("failed to read '{}': {er}", path.display()))
                })?,
        };

        ServiceAccountKey::parse(raw.expose_secret())
    }
}

/// The parts of a Google service account key file that the token exchange needs.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    private_key: SecretString,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn parse(json: &str) -> SinkResult<Self> {
        serde_json::from_str(json).map_err(|er| {
            SinkError::Credentials(format!("failed to parse service account json: {er}"))
        })
    }
}

// ###################################
// ->   TOKENS
// ###################################
#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: SecretString,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Hands out bearer tokens for a single service account.
pub struct TokenProvider {
    http_client: Client,
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<AccessToken>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, http_client: Client) -> SinkResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|er| SinkError::Credentials(format!("invalid private key: {er}")))?;

        Ok(Self {
            http_client,
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    /// Returns a cached access token or exchanges a new assertion for one.
    /// Holding the lock across the exchange keeps concurrent callers from refreshing twice.
    pub async fn access_token(&self) -> SinkResult<SecretString> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    async fn request_token(&self) -> SinkResult<AccessToken> {
        debug!("{:<20} - Requesting access token", "request_token");
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        let resp = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Token { status, body }.into());
        }

        let token: TokenResponse = resp.json().await.map_err(UpstreamError::from)?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at: now + TimeDelta::seconds(token.expires_in),
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> SinkResult<String> {
        let claims = Claims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + TimeDelta::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|er| SinkError::Credentials(format!("failed to sign assertion: {er}")))
    }
}
