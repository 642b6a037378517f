//! Simulated biometric recognition ceremonies
//!
//! Fingerprint and face recognition share one ceremony shape: enroll a
//! reference sample, then score presented samples against it and compare to
//! the match threshold. Actual matching is behind the [`SampleMatcher`]
//! trait; the default [`SimulatedMatcher`] draws scores from a two-level
//! distribution instead of inspecting the samples.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CeremonyError;
use crate::metrics::{names, MetricsSink, Outcome};
use crate::store::{keys, EphemeralStore};
use crate::token::{AuthMethod, IssuedToken, TokenIssuer};
use crate::validation;

/// Supported biometric modalities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiometricMethod {
    Fingerprint,
    Face,
}

impl BiometricMethod {
    /// Key namespace prefix for this modality
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Fingerprint => "fingerprint",
            Self::Face => "face",
        }
    }

    pub fn auth_method(&self) -> AuthMethod {
        match self {
            Self::Fingerprint => AuthMethod::Fingerprint,
            Self::Face => AuthMethod::Face,
        }
    }

    fn counter_name(&self) -> &'static str {
        match self {
            Self::Fingerprint => names::FINGERPRINT_RECOGNITIONS,
            Self::Face => names::FACE_RECOGNITIONS,
        }
    }

    /// Score levels for the simulated matcher: (likely match, likely reject)
    fn simulated_scores(&self) -> (f64, f64) {
        match self {
            Self::Fingerprint => (0.95, 0.3),
            Self::Face => (0.92, 0.4),
        }
    }
}

impl std::fmt::Display for BiometricMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key_prefix())
    }
}

/// Scores a presented sample against the enrolled reference.
///
/// Implementations return a similarity in `[0.0, 1.0]`; the ceremony applies
/// the threshold. Swapping in a real matcher engine changes nothing else.
pub trait SampleMatcher: Send + Sync {
    fn score(&self, method: BiometricMethod, enrolled: &[u8], presented: &[u8]) -> f64;
}

/// Default matcher: ignores sample content and draws a two-level score.
///
/// With probability `success_rate` it returns the modality's high score
/// (a clear match at the default threshold), otherwise the low score
/// (a clear reject).
#[derive(Debug, Clone)]
pub struct SimulatedMatcher {
    success_rate: f64,
}

impl SimulatedMatcher {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

impl SampleMatcher for SimulatedMatcher {
    fn score(&self, method: BiometricMethod, _enrolled: &[u8], _presented: &[u8]) -> f64 {
        let (high, low) = method.simulated_scores();
        if OsRng.gen::<f64>() < self.success_rate {
            high
        } else {
            low
        }
    }
}

/// Receipt for a stored reference sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentReceipt {
    pub subject: String,
    pub method: BiometricMethod,
    pub enrolled_at: DateTime<Utc>,
}

/// Audit row persisted for every recognition attempt that produced a score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionRow {
    pub subject: String,
    pub method: BiometricMethod,
    pub score: f64,
    pub matched: bool,
    pub timestamp_ms: i64,
}

/// Successful recognition outcome
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    pub subject: String,
    pub method: BiometricMethod,
    pub score: f64,
    pub threshold: f64,
    pub timestamp_ms: i64,
    pub token: IssuedToken,
}

/// Enrollment and recognition over the ephemeral store
pub struct BiometricCeremony {
    store: Arc<dyn EphemeralStore>,
    matcher: Arc<dyn SampleMatcher>,
    issuer: Arc<TokenIssuer>,
    metrics: Arc<dyn MetricsSink>,
    threshold: f64,
    enrollment_ttl: Duration,
    result_ttl: Duration,
}

impl BiometricCeremony {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        matcher: Arc<dyn SampleMatcher>,
        issuer: Arc<TokenIssuer>,
        metrics: Arc<dyn MetricsSink>,
        threshold: f64,
        enrollment_ttl: Duration,
        result_ttl: Duration,
    ) -> Self {
        Self {
            store,
            matcher,
            issuer,
            metrics,
            threshold,
            enrollment_ttl,
            result_ttl,
        }
    }

    /// Store (or replace) the subject's reference sample for a modality.
    ///
    /// Re-enrolling overwrites the previous reference and refreshes its TTL.
    pub async fn enroll(
        &self,
        subject: &str,
        method: BiometricMethod,
        sample: &[u8],
    ) -> Result<EnrollmentReceipt, CeremonyError> {
        validation::subject(subject)?;
        validation::sample(sample)?;

        let blob = STANDARD.encode(sample);
        self.store
            .set(
                &keys::enrollment(method.key_prefix(), subject),
                &blob,
                Some(self.enrollment_ttl),
            )
            .await?;

        info!(subject = %subject, method = %method, bytes = sample.len(), "Biometric sample enrolled");

        Ok(EnrollmentReceipt {
            subject: subject.to_string(),
            method,
            enrolled_at: Utc::now(),
        })
    }

    /// Score a presented sample against the enrolled reference and issue a
    /// token when the score clears the threshold.
    pub async fn recognize(
        &self,
        subject: &str,
        method: BiometricMethod,
        sample: &[u8],
    ) -> Result<RecognitionResult, CeremonyError> {
        let started = Instant::now();
        let result = self.try_recognize(subject, method, sample).await;

        let outcome = match &result {
            Ok(_) => Some(Outcome::Success),
            Err(CeremonyError::MatchBelowThreshold { .. }) => Some(Outcome::Failed),
            Err(CeremonyError::Store(_))
            | Err(CeremonyError::Token(_))
            | Err(CeremonyError::Internal(_)) => Some(Outcome::Error),
            // Unenrolled subjects and malformed input are not attempts.
            Err(_) => None,
        };
        if let Some(outcome) = outcome {
            self.metrics
                .increment_counter(method.counter_name(), &[("result", outcome.as_str())]);
            self.metrics.increment_counter(
                names::AUTH_ATTEMPTS,
                &[
                    ("method", method.auth_method().as_str()),
                    ("result", outcome.as_str()),
                ],
            );
            if matches!(outcome, Outcome::Success | Outcome::Failed) {
                self.metrics.observe_histogram(
                    names::AUTH_DURATION,
                    &[("method", method.auth_method().as_str())],
                    started.elapsed().as_secs_f64(),
                );
            }
        }

        result
    }

    async fn try_recognize(
        &self,
        subject: &str,
        method: BiometricMethod,
        sample: &[u8],
    ) -> Result<RecognitionResult, CeremonyError> {
        validation::subject(subject)?;
        validation::sample(sample)?;

        let blob = self
            .store
            .get(&keys::enrollment(method.key_prefix(), subject))
            .await?
            .ok_or(CeremonyError::SubjectNotEnrolled)?;
        let enrolled = STANDARD
            .decode(&blob)
            .map_err(|e| CeremonyError::Internal(format!("corrupt enrollment blob: {e}")))?;

        let score = self.matcher.score(method, &enrolled, sample);
        let matched = score >= self.threshold;
        let timestamp_ms = Utc::now().timestamp_millis();

        let row = RecognitionRow {
            subject: subject.to_string(),
            method,
            score,
            matched,
            timestamp_ms,
        };
        let raw = serde_json::to_string(&row)
            .map_err(|e| CeremonyError::Internal(format!("failed to serialize result: {e}")))?;
        self.store
            .set(
                &keys::recognition_result(method.key_prefix(), subject, timestamp_ms),
                &raw,
                Some(self.result_ttl),
            )
            .await?;

        if !matched {
            warn!(subject = %subject, method = %method, score, "Recognition below threshold");
            return Err(CeremonyError::MatchBelowThreshold {
                score,
                threshold: self.threshold,
            });
        }

        let token = self.issuer.issue(subject, method.auth_method())?;
        info!(subject = %subject, method = %method, score, "Recognition succeeded");

        Ok(RecognitionResult {
            subject: subject.to_string(),
            method,
            score,
            threshold: self.threshold,
            timestamp_ms,
            token,
        })
    }
}

impl std::fmt::Debug for BiometricCeremony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricCeremony")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMatcher(f64);

    impl SampleMatcher for FixedMatcher {
        fn score(&self, _method: BiometricMethod, _enrolled: &[u8], _presented: &[u8]) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_method_prefixes() {
        assert_eq!(BiometricMethod::Fingerprint.key_prefix(), "fingerprint");
        assert_eq!(BiometricMethod::Face.key_prefix(), "face");
        assert_eq!(BiometricMethod::Face.to_string(), "face");
    }

    #[test]
    fn test_simulated_matcher_two_level() {
        let always = SimulatedMatcher::new(1.0);
        let never = SimulatedMatcher::new(0.0);
        assert_eq!(always.score(BiometricMethod::Fingerprint, &[], &[]), 0.95);
        assert_eq!(never.score(BiometricMethod::Fingerprint, &[], &[]), 0.3);
        assert_eq!(always.score(BiometricMethod::Face, &[], &[]), 0.92);
        assert_eq!(never.score(BiometricMethod::Face, &[], &[]), 0.4);
    }

    #[test]
    fn test_success_rate_clamped() {
        let m = SimulatedMatcher::new(7.5);
        assert_eq!(m.score(BiometricMethod::Fingerprint, &[], &[]), 0.95);
    }

    #[test]
    fn test_fixed_matcher_is_object_safe() {
        let matcher: Arc<dyn SampleMatcher> = Arc::new(FixedMatcher(0.5));
        assert_eq!(matcher.score(BiometricMethod::Face, b"a", b"b"), 0.5);
    }
}
