//! Top-level ceremony coordinator
//!
//! Wires configuration, the ephemeral store, the metrics sink, and the token
//! issuer into the three ceremony families. Callers hold one `Coordinator`
//! and reach ceremonies through its accessors.

use std::sync::Arc;

use crate::biometric::{BiometricCeremony, SampleMatcher, SimulatedMatcher};
use crate::config::{Config, ConfigError};
use crate::health::{self, HealthReport};
use crate::metrics::MetricsSink;
use crate::qr::QrCeremony;
use crate::registry::CredentialRegistry;
use crate::store::EphemeralStore;
use crate::token::TokenIssuer;
use crate::webauthn::{RelyingParty, WebauthnCeremony};

pub struct Coordinator {
    store: Arc<dyn EphemeralStore>,
    webauthn: WebauthnCeremony,
    biometric: BiometricCeremony,
    qr: QrCeremony,
}

impl Coordinator {
    /// Build a coordinator with the default simulated biometric matcher
    pub fn new(
        config: Config,
        store: Arc<dyn EphemeralStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ConfigError> {
        let matcher = Arc::new(SimulatedMatcher::new(config.simulated_success_rate));
        Self::with_matcher(config, store, metrics, matcher)
    }

    /// Build a coordinator with a caller-supplied matcher engine
    pub fn with_matcher(
        config: Config,
        store: Arc<dyn EphemeralStore>,
        metrics: Arc<dyn MetricsSink>,
        matcher: Arc<dyn SampleMatcher>,
    ) -> Result<Self, ConfigError> {
        let rp = RelyingParty::new(&config)?;
        let issuer = Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl));
        let registry =
            CredentialRegistry::new(store.clone(), config.user_ttl, config.credential_ttl);

        let webauthn = WebauthnCeremony::new(
            rp,
            registry,
            store.clone(),
            issuer.clone(),
            metrics.clone(),
            config.challenge_ttl,
        );
        let biometric = BiometricCeremony::new(
            store.clone(),
            matcher,
            issuer.clone(),
            metrics.clone(),
            config.match_threshold,
            config.enrollment_ttl,
            config.result_ttl,
        );
        let qr = QrCeremony::new(store.clone(), issuer, metrics, config.qr_ttl);

        Ok(Self {
            store,
            webauthn,
            biometric,
            qr,
        })
    }

    pub fn webauthn(&self) -> &WebauthnCeremony {
        &self.webauthn
    }

    pub fn biometric(&self) -> &BiometricCeremony {
        &self.biometric
    }

    pub fn qr(&self) -> &QrCeremony {
        &self.qr
    }

    /// Probe the store and report coordinator health
    pub async fn health(&self) -> HealthReport {
        health::check(self.store.as_ref()).await
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}
