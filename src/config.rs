//! Coordinator configuration module
//!
//! Handles loading configuration from environment variables with sensible
//! defaults. Every TTL the legacy deployment hard-coded is configurable here,
//! including the user/credential lifetime split (1 h vs 24 h).

use std::time::Duration;

use url::Url;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid relying party origin: {0}")]
    InvalidOrigin(String),
    #[error("WebAuthn setup error: {0}")]
    Webauthn(String),
}

/// Coordinator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Relying Party ID, typically the domain name (default: "localhost")
    pub rp_id: String,
    /// Relying Party origin URL (default: "http://localhost:4202")
    pub rp_origin: Url,
    /// Human-readable Relying Party name (default: "BioGate")
    pub rp_name: String,
    /// Lifetime of registration/authentication challenges (default: 5 min)
    pub challenge_ttl: Duration,
    /// Lifetime of user records (default: 1 h)
    pub user_ttl: Duration,
    /// Lifetime of credential records (default: 24 h)
    pub credential_ttl: Duration,
    /// Lifetime of QR challenges (default: 5 min)
    pub qr_ttl: Duration,
    /// Lifetime of informational recognition result rows (default: 1 h)
    pub result_ttl: Duration,
    /// Lifetime of enrolled biometric samples (default: 24 h)
    pub enrollment_ttl: Duration,
    /// Session token lifetime (default: 1 h)
    pub token_ttl: Duration,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Similarity score a biometric sample must reach (default: 0.8)
    pub match_threshold: f64,
    /// Fraction of simulated recognitions that score in the passing band
    /// (default: 0.9, the documented contract)
    pub simulated_success_rate: f64,
}

const DEFAULT_RP_ORIGIN: &str = "http://localhost:4202";
const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

impl Default for Config {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_origin: Url::parse(DEFAULT_RP_ORIGIN).expect("default origin is a valid URL"),
            rp_name: "BioGate".to_string(),
            challenge_ttl: Duration::from_secs(300),
            user_ttl: Duration::from_secs(3600),
            credential_ttl: Duration::from_secs(86400),
            qr_ttl: Duration::from_secs(300),
            result_ttl: Duration::from_secs(3600),
            enrollment_ttl: Duration::from_secs(86400),
            token_ttl: Duration::from_secs(3600),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            match_threshold: 0.8,
            simulated_success_rate: 0.9,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BIOGATE_RP_ID` - Relying Party ID
    /// - `BIOGATE_RP_ORIGIN` - RP origin URL
    /// - `BIOGATE_RP_NAME` - RP display name
    /// - `BIOGATE_JWT_SECRET` - session token HMAC secret
    /// - `BIOGATE_CHALLENGE_TTL_SECS`, `BIOGATE_USER_TTL_SECS`,
    ///   `BIOGATE_CREDENTIAL_TTL_SECS`, `BIOGATE_QR_TTL_SECS`,
    ///   `BIOGATE_TOKEN_TTL_SECS` - lifetime overrides
    /// - `BIOGATE_MATCH_THRESHOLD` - biometric pass threshold
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rp_id = std::env::var("BIOGATE_RP_ID").unwrap_or(defaults.rp_id);
        let rp_name = std::env::var("BIOGATE_RP_NAME").unwrap_or(defaults.rp_name);

        let rp_origin = match std::env::var("BIOGATE_RP_ORIGIN") {
            Ok(raw) => Url::parse(&raw).map_err(|e| ConfigError::InvalidOrigin(e.to_string()))?,
            Err(_) => defaults.rp_origin,
        };

        let jwt_secret = match std::env::var("BIOGATE_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("BIOGATE_JWT_SECRET not set, using development secret");
                defaults.jwt_secret
            }
        };

        let match_threshold = std::env::var("BIOGATE_MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.match_threshold);

        Ok(Self {
            rp_id,
            rp_origin,
            rp_name,
            challenge_ttl: env_secs("BIOGATE_CHALLENGE_TTL_SECS", defaults.challenge_ttl),
            user_ttl: env_secs("BIOGATE_USER_TTL_SECS", defaults.user_ttl),
            credential_ttl: env_secs("BIOGATE_CREDENTIAL_TTL_SECS", defaults.credential_ttl),
            qr_ttl: env_secs("BIOGATE_QR_TTL_SECS", defaults.qr_ttl),
            result_ttl: env_secs("BIOGATE_RESULT_TTL_SECS", defaults.result_ttl),
            enrollment_ttl: env_secs("BIOGATE_ENROLLMENT_TTL_SECS", defaults.enrollment_ttl),
            token_ttl: env_secs("BIOGATE_TOKEN_TTL_SECS", defaults.token_ttl),
            jwt_secret,
            match_threshold,
            simulated_success_rate: defaults.simulated_success_rate,
        })
    }
}

fn env_secs(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rp_id, "localhost");
        assert_eq!(config.challenge_ttl, Duration::from_secs(300));
        assert_eq!(config.user_ttl, Duration::from_secs(3600));
        assert_eq!(config.credential_ttl, Duration::from_secs(86400));
        assert_eq!(config.match_threshold, 0.8);
    }

    // Single test for all env overrides; cargo runs tests in parallel and the
    // process environment is shared.
    #[test]
    fn test_env_overrides() {
        std::env::set_var("BIOGATE_CHALLENGE_TTL_SECS", "60");
        let config = Config::from_env().unwrap();
        assert_eq!(config.challenge_ttl, Duration::from_secs(60));
        std::env::remove_var("BIOGATE_CHALLENGE_TTL_SECS");

        std::env::set_var("BIOGATE_RP_ORIGIN", "not a url");
        let result = Config::from_env();
        std::env::remove_var("BIOGATE_RP_ORIGIN");
        assert!(matches!(result, Err(ConfigError::InvalidOrigin(_))));
    }
}
