//! WebAuthn ceremony integration tests.
//!
//! Attestation and assertion responses require a real authenticator, so
//! these tests exercise the ceremony state machine around verification:
//! begin/complete ordering, one-shot challenge consumption, duplicate
//! registration, expiry, and the metrics emitted along the way.

use std::sync::Arc;
use std::time::Duration;

use biogate::metrics::names;
use biogate::{CeremonyError, Config, Coordinator, MemoryStore, RecordingSink};
use webauthn_rs::prelude::{PublicKeyCredential, RegisterPublicKeyCredential};

fn coordinator_with(config: Config) -> (Coordinator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let coordinator =
        Coordinator::new(config, Arc::new(MemoryStore::new()), sink.clone()).unwrap();
    (coordinator, sink)
}

fn coordinator() -> (Coordinator, Arc<RecordingSink>) {
    coordinator_with(Config::default())
}

/// A syntactically valid attestation response that cannot verify against any
/// challenge
fn junk_attestation() -> RegisterPublicKeyCredential {
    serde_json::from_value(serde_json::json!({
        "id": "AAECAwQFBgc",
        "rawId": "AAECAwQFBgc",
        "response": {
            "attestationObject": "o2NmbXRkbm9uZQ",
            "clientDataJSON": "eyJmYWtlIjp0cnVlfQ",
        },
        "type": "public-key",
        "extensions": {},
    }))
    .unwrap()
}

/// A syntactically valid assertion response that cannot verify
fn junk_assertion() -> PublicKeyCredential {
    serde_json::from_value(serde_json::json!({
        "id": "AAECAwQFBgc",
        "rawId": "AAECAwQFBgc",
        "response": {
            "authenticatorData": "AAECAwQFBgcICQ",
            "clientDataJSON": "eyJmYWtlIjp0cnVlfQ",
            "signature": "AAECAwQFBgc",
            "userHandle": null,
        },
        "type": "public-key",
        "extensions": {},
    }))
    .unwrap()
}

#[tokio::test]
async fn test_begin_registration_echoes_subject() {
    let (coordinator, _) = coordinator();
    let challenge = coordinator
        .webauthn()
        .begin_registration("alice", "Alice Example")
        .await
        .unwrap();

    assert_eq!(challenge.user.name, "alice");
    assert_eq!(challenge.user.display_name, "Alice Example");
    assert_eq!(challenge.public_key.public_key.user.name, "alice");
}

#[tokio::test]
async fn test_double_begin_registration_rejected() {
    let (coordinator, _) = coordinator();
    coordinator
        .webauthn()
        .begin_registration("alice", "Alice Example")
        .await
        .unwrap();

    let err = coordinator
        .webauthn()
        .begin_registration("alice", "Alice Again")
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn test_complete_registration_without_begin() {
    let (coordinator, sink) = coordinator();
    let err = coordinator
        .webauthn()
        .complete_registration("alice", &junk_attestation())
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::ChallengeNotFound));
    // Missing challenges are not counted as attempts.
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_failed_attestation_consumes_challenge() {
    let (coordinator, sink) = coordinator();
    coordinator
        .webauthn()
        .begin_registration("alice", "Alice Example")
        .await
        .unwrap();

    let err = coordinator
        .webauthn()
        .complete_registration("alice", &junk_attestation())
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::VerificationFailed(_)));
    assert_eq!(
        sink.counter_value(names::WEBAUTHN_REGISTRATIONS, &[("result", "failed")]),
        1
    );
    assert_eq!(
        sink.counter_value(
            names::AUTH_ATTEMPTS,
            &[("method", "webauthn"), ("result", "failed")]
        ),
        1
    );

    // The challenge was consumed by the failed attempt.
    let err = coordinator
        .webauthn()
        .complete_registration("alice", &junk_attestation())
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::ChallengeNotFound));
}

#[tokio::test]
async fn test_registration_challenge_expires() {
    let config = Config {
        challenge_ttl: Duration::from_millis(50),
        ..Config::default()
    };
    let (coordinator, _) = coordinator_with(config);
    coordinator
        .webauthn()
        .begin_registration("alice", "Alice Example")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = coordinator
        .webauthn()
        .complete_registration("alice", &junk_attestation())
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::ChallengeNotFound));
}

#[tokio::test]
async fn test_begin_authentication_unknown_subject() {
    let (coordinator, _) = coordinator();
    let err = coordinator
        .webauthn()
        .begin_authentication("nobody-here")
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::UserNotFound));
}

#[tokio::test]
async fn test_begin_authentication_without_credentials() {
    let (coordinator, _) = coordinator();
    // Begin registration creates the user record, but no credential was ever
    // completed.
    coordinator
        .webauthn()
        .begin_registration("alice", "Alice Example")
        .await
        .unwrap();

    let err = coordinator
        .webauthn()
        .begin_authentication("alice")
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::NoCredentials));
}

#[tokio::test]
async fn test_complete_authentication_without_begin() {
    let (coordinator, _) = coordinator();
    let err = coordinator
        .webauthn()
        .complete_authentication("alice", &junk_assertion())
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::ChallengeNotFound));
}

#[tokio::test]
async fn test_subject_validation_runs_before_store_access() {
    let (coordinator, _) = coordinator();
    let err = coordinator
        .webauthn()
        .begin_registration("ab", "Alice Example")
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::Validation(_)));

    let err = coordinator
        .webauthn()
        .begin_registration("alice:injected", "Alice Example")
        .await
        .unwrap_err();
    assert!(matches!(err, CeremonyError::Validation(_)));
}
