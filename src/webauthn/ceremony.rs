use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use webauthn_rs::prelude::{
    PasskeyAuthentication, PasskeyRegistration, PublicKeyCredential, RegisterPublicKeyCredential,
};

use crate::error::CeremonyError;
use crate::metrics::{names, MetricsSink, Outcome};
use crate::registry::{CredentialRecord, CredentialRegistry, UserRecord};
use crate::store::{keys, EphemeralStore};
use crate::token::{AuthMethod, IssuedToken, TokenIssuer};
use crate::{challenge, validation};

use super::types::{
    AllowedCredential, AuthenticationChallenge, RegisteredCredential, RegistrationChallenge,
    UserEcho,
};
use super::RelyingParty;

/// WebAuthn registration and authentication ceremonies.
///
/// Each ceremony is a begin/complete pair. Begin stores the server-side
/// verification state under a subject-scoped key with a short TTL; complete
/// consumes that state at most once, then hands the client response to the
/// verification library.
pub struct WebauthnCeremony {
    rp: RelyingParty,
    registry: CredentialRegistry,
    store: Arc<dyn EphemeralStore>,
    issuer: Arc<TokenIssuer>,
    metrics: Arc<dyn MetricsSink>,
    challenge_ttl: Duration,
}

impl WebauthnCeremony {
    pub fn new(
        rp: RelyingParty,
        registry: CredentialRegistry,
        store: Arc<dyn EphemeralStore>,
        issuer: Arc<TokenIssuer>,
        metrics: Arc<dyn MetricsSink>,
        challenge_ttl: Duration,
    ) -> Self {
        Self {
            rp,
            registry,
            store,
            issuer,
            metrics,
            challenge_ttl,
        }
    }

    // ==== Registration ====

    /// Open a registration ceremony for a new subject.
    ///
    /// Fails with `AlreadyRegistered` if a live user record exists. The user
    /// record is written at begin so repeated begins for the same subject are
    /// rejected even before any credential is registered.
    pub async fn begin_registration(
        &self,
        subject: &str,
        display_name: &str,
    ) -> Result<RegistrationChallenge, CeremonyError> {
        validation::subject(subject)?;
        validation::display_name(display_name)?;

        if self.registry.load_user(subject).await?.is_some() {
            warn!(subject = %subject, "Registration rejected, subject already registered");
            return Err(CeremonyError::AlreadyRegistered(subject.to_string()));
        }

        let user = UserRecord::new(subject, display_name);
        let (creation, reg_state) = self
            .rp
            .webauthn()
            .start_passkey_registration(user.handle, subject, display_name, None)
            .map_err(|e| CeremonyError::Internal(format!("registration options: {e:?}")))?;

        self.put_state(&keys::registration_challenge(subject), &reg_state)
            .await?;
        self.registry.save_user(&user).await?;

        info!(subject = %subject, handle = %user.handle, "WebAuthn registration started");

        Ok(RegistrationChallenge {
            public_key: creation,
            user: UserEcho {
                handle: user.handle,
                name: user.id,
                display_name: user.display_name,
            },
        })
    }

    /// Complete a registration ceremony.
    ///
    /// The stored registration state is consumed before verification runs, so
    /// a given challenge can be answered at most once regardless of outcome.
    pub async fn complete_registration(
        &self,
        subject: &str,
        credential: &RegisterPublicKeyCredential,
    ) -> Result<RegisteredCredential, CeremonyError> {
        let result = self.try_complete_registration(subject, credential).await;
        self.record_outcome(names::WEBAUTHN_REGISTRATIONS, &result);
        result
    }

    async fn try_complete_registration(
        &self,
        subject: &str,
        credential: &RegisterPublicKeyCredential,
    ) -> Result<RegisteredCredential, CeremonyError> {
        validation::subject(subject)?;

        let reg_state: PasskeyRegistration = self
            .take_state(&keys::registration_challenge(subject))
            .await?;

        let mut user = self
            .registry
            .load_user(subject)
            .await?
            .ok_or(CeremonyError::UserNotFound)?;

        let passkey = self
            .rp
            .webauthn()
            .finish_passkey_registration(credential, &reg_state)
            .map_err(|e| {
                warn!(subject = %subject, error = ?e, "Attestation verification failed");
                CeremonyError::VerificationFailed(format!("{e:?}"))
            })?;

        let credential_id = challenge::encode(passkey.cred_id());
        let record = CredentialRecord {
            id: credential_id.clone(),
            owner: subject.to_string(),
            passkey,
            sign_count: 0,
            transports: credential.response.transports.clone().unwrap_or_default(),
            created_at: chrono::Utc::now(),
        };

        self.registry.save_credential(&record).await?;
        user.add_credential(&credential_id);
        if let Err(e) = self.registry.save_user(&user).await {
            // Roll back the credential row so the registry never holds a
            // credential no user record points at.
            let _ = self.registry.delete_credential(&credential_id).await;
            return Err(e);
        }

        info!(subject = %subject, credential_id = %credential_id, "WebAuthn registration completed");

        Ok(RegisteredCredential { credential_id })
    }

    // ==== Authentication ====

    /// Open an authentication ceremony for a registered subject.
    pub async fn begin_authentication(
        &self,
        subject: &str,
    ) -> Result<AuthenticationChallenge, CeremonyError> {
        validation::subject(subject)?;

        let user = self
            .registry
            .load_user(subject)
            .await?
            .ok_or(CeremonyError::UserNotFound)?;

        let credentials = self.registry.user_credentials(&user).await?;
        if credentials.is_empty() {
            warn!(subject = %subject, "Authentication rejected, no live credentials");
            return Err(CeremonyError::NoCredentials);
        }

        let passkeys: Vec<_> = credentials.iter().map(|c| c.passkey.clone()).collect();
        let (request, auth_state) = self
            .rp
            .webauthn()
            .start_passkey_authentication(&passkeys)
            .map_err(|e| CeremonyError::Internal(format!("authentication options: {e:?}")))?;

        self.put_state(&keys::authentication_challenge(subject), &auth_state)
            .await?;

        info!(
            subject = %subject,
            credentials = credentials.len(),
            "WebAuthn authentication started"
        );

        // Ids and transport hints only. Key material and counters stay
        // server-side.
        let allow_credentials = credentials
            .into_iter()
            .map(|c| AllowedCredential {
                id: c.id,
                transports: c.transports,
            })
            .collect();

        Ok(AuthenticationChallenge {
            public_key: request,
            allow_credentials,
        })
    }

    /// Complete an authentication ceremony, issuing a session token.
    pub async fn complete_authentication(
        &self,
        subject: &str,
        credential: &PublicKeyCredential,
    ) -> Result<IssuedToken, CeremonyError> {
        let started = Instant::now();
        let result = self.try_complete_authentication(subject, credential).await;
        self.record_outcome(names::WEBAUTHN_AUTHENTICATIONS, &result);
        if matches!(&result, Ok(_) | Err(CeremonyError::VerificationFailed(_))) {
            self.metrics.observe_histogram(
                names::AUTH_DURATION,
                &[("method", AuthMethod::Webauthn.as_str())],
                started.elapsed().as_secs_f64(),
            );
        }
        result
    }

    async fn try_complete_authentication(
        &self,
        subject: &str,
        credential: &PublicKeyCredential,
    ) -> Result<IssuedToken, CeremonyError> {
        validation::subject(subject)?;

        let auth_state: PasskeyAuthentication = self
            .take_state(&keys::authentication_challenge(subject))
            .await?;

        let auth_result = self
            .rp
            .webauthn()
            .finish_passkey_authentication(credential, &auth_state)
            .map_err(|e| {
                warn!(subject = %subject, error = ?e, "Assertion verification failed");
                CeremonyError::VerificationFailed(format!("{e:?}"))
            })?;

        let credential_id = challenge::encode(auth_result.cred_id());
        let mut record = self
            .registry
            .load_credential(&credential_id)
            .await?
            .ok_or(CeremonyError::CredentialNotFound)?;

        if record.owner != subject {
            warn!(
                subject = %subject,
                credential_id = %credential_id,
                "Assertion presented a credential owned by another subject"
            );
            return Err(CeremonyError::CredentialNotFound);
        }

        // The new counter must strictly exceed the stored one. Authenticators
        // that never implement a counter report zero on both sides, which is
        // the single permitted non-increase.
        let new_count = auth_result.counter();
        if new_count <= record.sign_count && !(new_count == 0 && record.sign_count == 0) {
            warn!(
                subject = %subject,
                credential_id = %credential_id,
                stored = record.sign_count,
                presented = new_count,
                "Signature counter did not advance, possible cloned authenticator"
            );
            return Err(CeremonyError::VerificationFailed(format!(
                "signature counter did not advance: stored {} >= presented {}",
                record.sign_count, new_count
            )));
        }

        record.passkey.update_credential(&auth_result);
        record.sign_count = new_count;
        self.registry.save_credential(&record).await?;

        let token = self.issuer.issue(subject, AuthMethod::Webauthn)?;
        info!(subject = %subject, credential_id = %credential_id, "WebAuthn authentication completed");
        Ok(token)
    }

    // ==== State plumbing ====

    /// Serialize server-side ceremony state under `key` with the challenge TTL
    async fn put_state<T: Serialize>(&self, key: &str, state: &T) -> Result<(), CeremonyError> {
        let raw = serde_json::to_string(state)
            .map_err(|e| CeremonyError::Internal(format!("failed to serialize state: {e}")))?;
        self.store
            .set(key, &raw, Some(self.challenge_ttl))
            .await
            .map_err(Into::into)
    }

    /// Consume ceremony state at most once.
    ///
    /// The read and the delete are separate store operations; the delete is
    /// the authoritative claim. If another completion raced us to it, this
    /// attempt loses and reports the challenge gone.
    async fn take_state<T: DeserializeOwned>(&self, key: &str) -> Result<T, CeremonyError> {
        let raw = self
            .store
            .get(key)
            .await?
            .ok_or(CeremonyError::ChallengeNotFound)?;
        if !self.store.del(key).await? {
            return Err(CeremonyError::ChallengeNotFound);
        }
        serde_json::from_str(&raw)
            .map_err(|e| CeremonyError::Internal(format!("failed to deserialize state: {e}")))
    }

    /// Counter bookkeeping at ceremony completion: the ceremony-specific
    /// counter plus the shared attempts counter, labelled by outcome.
    fn record_outcome<T>(&self, counter: &str, result: &Result<T, CeremonyError>) {
        let outcome = match result {
            Ok(_) => Outcome::Success,
            Err(CeremonyError::VerificationFailed(_)) => Outcome::Failed,
            Err(CeremonyError::Store(_))
            | Err(CeremonyError::Token(_))
            | Err(CeremonyError::Internal(_)) => Outcome::Error,
            // Not-found and validation rejections are not attempts.
            Err(_) => return,
        };
        self.metrics
            .increment_counter(counter, &[("result", outcome.as_str())]);
        self.metrics.increment_counter(
            names::AUTH_ATTEMPTS,
            &[
                ("method", AuthMethod::Webauthn.as_str()),
                ("result", outcome.as_str()),
            ],
        );
    }
}

impl std::fmt::Debug for WebauthnCeremony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebauthnCeremony")
            .field("challenge_ttl", &self.challenge_ttl)
            .finish_non_exhaustive()
    }
}
