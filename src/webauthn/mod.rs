//! WebAuthn ceremonies
//!
//! Registration and authentication ceremonies for public-key credentials.
//! Cryptographic verification of attestations and assertions is delegated to
//! `webauthn-rs`; ceremony state between begin and complete is serialized
//! into the ephemeral store under the subject-scoped challenge keys.

mod ceremony;
mod types;

pub use ceremony::WebauthnCeremony;
pub use types::{
    AllowedCredential, AuthenticationChallenge, RegisteredCredential, RegistrationChallenge,
    UserEcho,
};

use webauthn_rs::prelude::{Webauthn, WebauthnBuilder};

use crate::config::{Config, ConfigError};

/// Relying Party identity wrapper around the verification library
pub struct RelyingParty {
    webauthn: Webauthn,
}

impl RelyingParty {
    /// Build the relying party from configuration (RP id, origin, name)
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let builder = WebauthnBuilder::new(&config.rp_id, &config.rp_origin)
            .map_err(|e| ConfigError::Webauthn(format!("{e:?}")))?
            .rp_name(&config.rp_name)
            .allow_subdomains(false);

        Ok(Self {
            webauthn: builder
                .build()
                .map_err(|e| ConfigError::Webauthn(format!("{e:?}")))?,
        })
    }

    pub fn webauthn(&self) -> &Webauthn {
        &self.webauthn
    }
}

impl std::fmt::Debug for RelyingParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelyingParty")
            .field("webauthn", &"<Webauthn instance>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relying_party_from_default_config() {
        let config = Config::default();
        let rp = RelyingParty::new(&config).unwrap();
        assert!(rp
            .webauthn()
            .get_allowed_origins()
            .contains(&config.rp_origin));
    }
}
