//! Ceremony error handling module
//!
//! Provides a unified error type for all ceremony operations with structured
//! variants, plus the coarse taxonomy the excluded HTTP layer maps onto
//! response statuses.

use thiserror::Error;

use crate::store::StoreError;

/// Coarse error taxonomy for callers that only care about the failure class.
///
/// `NotFoundOrExpired` deliberately covers both "never existed" and "timed
/// out" so responses cannot be used as an oracle for which one happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Ceremony or credential state is missing or timed out
    NotFoundOrExpired,
    /// Duplicate registration
    AlreadyExists,
    /// Cryptographic or similarity check failed
    VerificationFailed,
    /// Malformed input, rejected before any store access
    Validation,
    /// Infrastructure fault; caller should retry with backoff
    StoreUnavailable,
    /// Unexpected server-side failure
    Internal,
}

/// Ceremony error type with structured variants for each failure the
/// coordinator can report.
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// A user record already exists for this subject
    #[error("subject '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No live challenge for this ceremony; never distinguishes expiry from absence
    #[error("challenge not found or expired")]
    ChallengeNotFound,

    /// No user record for this subject
    #[error("user not found")]
    UserNotFound,

    /// User record exists but holds no registered credentials
    #[error("no credentials registered for this user")]
    NoCredentials,

    /// Assertion referenced a credential the registry does not hold
    #[error("credential not found")]
    CredentialNotFound,

    /// No enrolled biometric sample for this subject
    #[error("subject not enrolled")]
    SubjectNotEnrolled,

    /// Similarity score fell below the configured threshold
    #[error("match score {score:.2} below threshold {threshold:.2}")]
    MatchBelowThreshold { score: f64, threshold: f64 },

    /// QR challenge record is missing or timed out
    #[error("QR code not found or expired")]
    NotFoundOrExpired,

    /// Cryptographic verification of an attestation or assertion failed
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Malformed input, checked before any store access
    #[error("invalid input: {0}")]
    Validation(String),

    /// Ephemeral store fault
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Token issuance failed
    #[error("token issuance failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Unexpected server-side failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl CeremonyError {
    /// Get the error code for programmatic error handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            Self::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::NoCredentials => "NO_CREDENTIALS",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::SubjectNotEnrolled => "SUBJECT_NOT_ENROLLED",
            Self::MatchBelowThreshold { .. } => "MATCH_BELOW_THRESHOLD",
            Self::NotFoundOrExpired => "NOT_FOUND_OR_EXPIRED",
            Self::VerificationFailed(_) => "VERIFICATION_FAILED",
            Self::Validation(_) => "INVALID_INPUT",
            Self::Store(_) => "STORE_UNAVAILABLE",
            Self::Token(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the coarse taxonomy class for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChallengeNotFound
            | Self::UserNotFound
            | Self::NoCredentials
            | Self::CredentialNotFound
            | Self::SubjectNotEnrolled
            | Self::NotFoundOrExpired => ErrorKind::NotFoundOrExpired,
            Self::AlreadyRegistered(_) => ErrorKind::AlreadyExists,
            Self::MatchBelowThreshold { .. } | Self::VerificationFailed(_) => {
                ErrorKind::VerificationFailed
            }
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::StoreUnavailable,
            Self::Token(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
