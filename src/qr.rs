//! QR code challenge ceremonies
//!
//! Generate encodes a short-lived, subject-bound nonce record into a PNG QR
//! image; validate consumes the presented record one-shot and issues a token.
//! The server-side record under `qr:{subject}:{nonce}` is the source of
//! truth. The presented payload only tells us which record to look up.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::challenge;
use crate::error::CeremonyError;
use crate::metrics::{names, MetricsSink, Outcome};
use crate::store::{keys, EphemeralStore};
use crate::token::{AuthMethod, IssuedToken, TokenIssuer};
use crate::validation;

/// Record bound to one QR challenge, both stored server-side and serialized
/// into the QR image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrRecord {
    pub subject: String,
    pub nonce: String,
    /// Issuance time in milliseconds since the epoch
    pub timestamp_ms: i64,
    /// Caller-supplied payload echoed through the ceremony
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

/// A freshly generated QR challenge
#[derive(Debug, Clone, Serialize)]
pub struct QrChallenge {
    /// The serialized record, exactly as encoded into the image
    pub token: String,
    /// PNG rendering as a `data:image/png;base64,` URL
    pub image: String,
    pub expires_at: DateTime<Utc>,
}

/// QR generation and validation over the ephemeral store
pub struct QrCeremony {
    store: Arc<dyn EphemeralStore>,
    issuer: Arc<TokenIssuer>,
    metrics: Arc<dyn MetricsSink>,
    qr_ttl: Duration,
}

impl QrCeremony {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        issuer: Arc<TokenIssuer>,
        metrics: Arc<dyn MetricsSink>,
        qr_ttl: Duration,
    ) -> Self {
        Self {
            store,
            issuer,
            metrics,
            qr_ttl,
        }
    }

    /// Generate a QR challenge for a subject.
    ///
    /// Multiple challenges may be live for one subject at a time; each nonce
    /// keys its own record.
    pub async fn generate(
        &self,
        subject: &str,
        payload: serde_json::Value,
    ) -> Result<QrChallenge, CeremonyError> {
        let result = self.try_generate(subject, payload).await;
        match &result {
            Ok(_) => self
                .metrics
                .increment_counter(names::QR_GENERATIONS, &[("result", Outcome::Success.as_str())]),
            Err(CeremonyError::Store(_)) | Err(CeremonyError::Internal(_)) => self
                .metrics
                .increment_counter(names::QR_GENERATIONS, &[("result", Outcome::Error.as_str())]),
            Err(_) => {}
        }
        result
    }

    async fn try_generate(
        &self,
        subject: &str,
        payload: serde_json::Value,
    ) -> Result<QrChallenge, CeremonyError> {
        validation::subject(subject)?;

        let record = QrRecord {
            subject: subject.to_string(),
            nonce: challenge::qr_token(),
            timestamp_ms: Utc::now().timestamp_millis(),
            payload,
        };
        let token = serde_json::to_string(&record)
            .map_err(|e| CeremonyError::Internal(format!("failed to serialize QR record: {e}")))?;

        self.store
            .set(
                &keys::qr_challenge(subject, &record.nonce),
                &token,
                Some(self.qr_ttl),
            )
            .await?;

        let image = render_png_data_url(&token)?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.qr_ttl).unwrap_or_else(|_| chrono::Duration::zero());

        info!(subject = %subject, nonce = %record.nonce, "QR challenge generated");

        Ok(QrChallenge {
            token,
            image,
            expires_at,
        })
    }

    /// Validate a presented QR token and issue a session token.
    ///
    /// The stored record is consumed before the freshness check, so a
    /// presented token buys at most one validation attempt.
    pub async fn validate(&self, token: &str) -> Result<IssuedToken, CeremonyError> {
        let started = Instant::now();
        let result = self.try_validate(token).await;

        let outcome = match &result {
            Ok(_) => Some(Outcome::Success),
            Err(CeremonyError::NotFoundOrExpired) => Some(Outcome::Failed),
            Err(CeremonyError::Store(_))
            | Err(CeremonyError::Token(_))
            | Err(CeremonyError::Internal(_)) => Some(Outcome::Error),
            Err(_) => None,
        };
        if let Some(outcome) = outcome {
            self.metrics
                .increment_counter(names::QR_VALIDATIONS, &[("result", outcome.as_str())]);
            self.metrics.increment_counter(
                names::AUTH_ATTEMPTS,
                &[
                    ("method", AuthMethod::Qr.as_str()),
                    ("result", outcome.as_str()),
                ],
            );
            if matches!(outcome, Outcome::Success | Outcome::Failed) {
                self.metrics.observe_histogram(
                    names::AUTH_DURATION,
                    &[("method", AuthMethod::Qr.as_str())],
                    started.elapsed().as_secs_f64(),
                );
            }
        }

        result
    }

    async fn try_validate(&self, token: &str) -> Result<IssuedToken, CeremonyError> {
        let presented: QrRecord = serde_json::from_str(token)
            .map_err(|e| CeremonyError::Validation(format!("malformed QR token: {e}")))?;
        validation::subject(&presented.subject)?;
        if presented.nonce.is_empty() {
            return Err(CeremonyError::Validation("missing nonce".to_string()));
        }

        let key = keys::qr_challenge(&presented.subject, &presented.nonce);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or(CeremonyError::NotFoundOrExpired)?;
        if !self.store.del(&key).await? {
            return Err(CeremonyError::NotFoundOrExpired);
        }

        let stored: QrRecord = serde_json::from_str(&raw)
            .map_err(|e| CeremonyError::Internal(format!("corrupt QR record: {e}")))?;

        // Wall-clock freshness on top of the store TTL. The stored timestamp
        // is authoritative, not the one presented by the client.
        let age_ms = Utc::now().timestamp_millis() - stored.timestamp_ms;
        if age_ms < 0 || age_ms as u128 > self.qr_ttl.as_millis() {
            warn!(subject = %stored.subject, nonce = %stored.nonce, age_ms, "Stale QR record consumed");
            return Err(CeremonyError::NotFoundOrExpired);
        }

        let issued = self.issuer.issue(&stored.subject, AuthMethod::Qr)?;
        info!(subject = %stored.subject, nonce = %stored.nonce, "QR challenge validated");
        Ok(issued)
    }
}

impl std::fmt::Debug for QrCeremony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrCeremony")
            .field("qr_ttl", &self.qr_ttl)
            .finish_non_exhaustive()
    }
}

/// Render text into a PNG QR image and wrap it as a base64 data URL
fn render_png_data_url(data: &str) -> Result<String, CeremonyError> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| CeremonyError::Internal(format!("QR encoding failed: {e}")))?;
    let img = code.render::<Luma<u8>>().build();

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CeremonyError::Internal(format!("PNG encoding failed: {e}")))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}
