//! Ephemeral state store boundary
//!
//! All ceremony state lives in an external TTL-capable key-value store; the
//! coordinator itself is stateless between calls, so multiple instances can
//! run side by side with the store's atomic operations as the only
//! synchronization primitive.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: in-process, for tests and development
//! - [`RedisStore`]: the store the legacy deployment runs on
//!
//! `del` reports whether the key existed, which is what gives Complete calls
//! at-most-once challenge consumption: delete the challenge before acting on
//! it, and abort if another call already consumed it.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation failed: {0}")]
    Operation(String),
}

/// TTL-capable key-value store with atomic per-key operations.
///
/// Each method maps to a single atomic store command; the coordinator never
/// needs multi-key transactions.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Get the value at `key`, if present and not expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set `key` to `value`, overwriting any prior value. `ttl` of `None`
    /// means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete `key`, reporting whether it existed (atomic conditional delete)
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically increment the integer at `key`, creating it at 0 first
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Check store reachability
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Persisted key namespaces, preserved for interoperability with the legacy
/// system when run against the same store.
pub mod keys {
    /// User record: `webauthn:user:{subject}`
    pub fn user(subject: &str) -> String {
        format!("webauthn:user:{subject}")
    }

    /// Registration challenge: `webauthn:challenge:{subject}`
    pub fn registration_challenge(subject: &str) -> String {
        format!("webauthn:challenge:{subject}")
    }

    /// Authentication challenge: `webauthn:auth:challenge:{subject}`.
    /// Scoped separately so it never collides with a registration challenge
    /// for the same subject.
    pub fn authentication_challenge(subject: &str) -> String {
        format!("webauthn:auth:challenge:{subject}")
    }

    /// Credential record: `webauthn:credential:{credentialId}`
    pub fn credential(credential_id: &str) -> String {
        format!("webauthn:credential:{credential_id}")
    }

    /// Enrolled biometric sample: `fingerprint:{subject}` / `face:{subject}`
    pub fn enrollment(method: &str, subject: &str) -> String {
        format!("{method}:{subject}")
    }

    /// Timestamped recognition result row:
    /// `fingerprint:{subject}:{ts}` / `face:{subject}:{ts}`
    pub fn recognition_result(method: &str, subject: &str, timestamp_ms: i64) -> String {
        format!("{method}:{subject}:{timestamp_ms}")
    }

    /// QR challenge: `qr:{subject}:{nonce}`
    pub fn qr_challenge(subject: &str, nonce: &str) -> String {
        format!("qr:{subject}:{nonce}")
    }

}
