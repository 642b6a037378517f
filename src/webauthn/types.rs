use serde::{Deserialize, Serialize};
use uuid::Uuid;
use webauthn_rs::prelude::{CreationChallengeResponse, RequestChallengeResponse};
use webauthn_rs_proto::AuthenticatorTransport;

/// Challenge handed to the client to start credential creation.
///
/// `public_key` is the standard `PublicKeyCredentialCreationOptions` envelope
/// produced by the verification library; `user` echoes back the identity the
/// ceremony was opened for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationChallenge {
    pub public_key: CreationChallengeResponse,
    pub user: UserEcho,
}

/// Subject identity echoed alongside a registration challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEcho {
    pub handle: Uuid,
    pub name: String,
    pub display_name: String,
}

/// Outcome of a completed registration ceremony
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredCredential {
    /// Base64url (unpadded) credential id as registered by the authenticator
    pub credential_id: String,
}

/// Challenge handed to the client to start an assertion.
///
/// The allow list carries credential ids and transport hints only. Public
/// keys and signature counters never leave the server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationChallenge {
    pub public_key: RequestChallengeResponse,
    pub allow_credentials: Vec<AllowedCredential>,
}

/// Credential descriptor advertised in an authentication allow list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedCredential {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<AuthenticatorTransport>,
}
