//! Service-account token exchange
//!
//! The spreadsheet backend authenticates via a signed assertion: an RS256 JWT
//! built from the service-account key, traded at the token endpoint for a
//! short-lived bearer token. Callers cache the result per request-context
//! until near expiry.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, Result};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Parsed service-account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::InvalidInput(format!("service account key: {}", e)))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// A bearer token plus its absolute expiry (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: i64,
}

impl AccessToken {
    /// Near-expiry check with 60 s of slack.
    pub fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at - 60
    }
}

/// Builds the signed assertion for `key`, valid from `iat`.
pub fn build_assertion(key: &ServiceAccountKey, iat: i64) -> Result<String> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| DomainError::InvalidInput(format!("service account private key: {}", e)))?;
    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| DomainError::Io(format!("assertion signing: {}", e)))
}

/// Performs the assertion exchange against the key's token endpoint.
pub async fn exchange_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
) -> Result<AccessToken> {
    let now = Utc::now().timestamp();
    let assertion = build_assertion(key, now)?;

    let resp = http
        .post(&key.token_uri)
        .form(&[("grant_type", ASSERTION_GRANT), ("assertion", &assertion)])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(DomainError::upstream("POST token endpoint", status, &body));
    }

    let token: TokenResponse = resp.json().await?;
    Ok(AccessToken {
        token: token.access_token,
        expires_at: now + token.expires_in,
    })
}
