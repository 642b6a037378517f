//! Session token issuer
//!
//! On ceremony success the coordinator mints a signed, expiring JWT binding
//! subject and method. Verification belongs to downstream consumers and is
//! deliberately not exposed here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::CeremonyError;

/// Authentication method a ceremony completed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Webauthn,
    Fingerprint,
    Face,
    Qr,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webauthn => "webauthn",
            Self::Fingerprint => "fingerprint",
            Self::Face => "face",
            Self::Qr => "qr",
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject the ceremony authenticated
    pub sub: String,
    /// Method that authenticated the subject
    pub method: AuthMethod,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// A minted session token with its expiry instant
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints HS256-signed session tokens
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token binding `subject` to the completed `method`
    pub fn issue(&self, subject: &str, method: AuthMethod) -> Result<IssuedToken, CeremonyError> {
        let now = Utc::now();
        let expires_at = now
            + chrono::TimeDelta::from_std(self.ttl)
                .map_err(|e| CeremonyError::Internal(format!("token TTL out of range: {e}")))?;

        let claims = TokenClaims {
            sub: subject.to_string(),
            method,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.key)?;
        Ok(IssuedToken { token, expires_at })
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("key", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}
