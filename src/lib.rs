//! BioGate - Biometric ceremony coordinator library
//!
//! This crate coordinates multi-modal authentication ceremonies over an
//! ephemeral TTL key-value store:
//!
//! - WebAuthn registration and authentication, with cryptographic
//!   verification delegated to `webauthn-rs`
//! - Simulated fingerprint and face recognition behind a pluggable matcher
//! - One-shot QR code challenges rendered as PNG data URLs
//!
//! Successful ceremonies issue HS256 session tokens. All per-ceremony state
//! expires out of the store on its own, so the coordinator itself is
//! stateless and safe to run in multiple instances against one store.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use biogate::{Config, Coordinator, MemoryStore, NullSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = Coordinator::new(
//!     Config::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NullSink),
//! )?;
//!
//! // Open a WebAuthn registration ceremony for a new subject.
//! let challenge = coordinator
//!     .webauthn()
//!     .begin_registration("alice", "Alice Example")
//!     .await?;
//! # let _ = challenge;
//! # Ok(())
//! # }
//! ```

pub mod biometric;
pub mod challenge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod metrics;
pub mod qr;
pub mod registry;
pub mod store;
pub mod token;
pub mod validation;
pub mod webauthn;

// Re-export main types for convenience
pub use biometric::{
    BiometricCeremony, BiometricMethod, RecognitionResult, SampleMatcher, SimulatedMatcher,
};
pub use config::{Config, ConfigError};
pub use coordinator::Coordinator;
pub use error::{CeremonyError, ErrorKind};
pub use health::{HealthReport, HealthStatus};
pub use metrics::{MetricsSink, NullSink, Outcome, RecordingSink};
pub use qr::{QrCeremony, QrChallenge};
pub use registry::{CredentialRecord, CredentialRegistry, UserRecord};
pub use store::{EphemeralStore, MemoryStore, RedisStore, StoreError};
pub use token::{AuthMethod, IssuedToken, TokenClaims, TokenIssuer};
pub use webauthn::{
    AuthenticationChallenge, RegisteredCredential, RegistrationChallenge, WebauthnCeremony,
};
