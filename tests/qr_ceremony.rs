//! QR challenge integration tests.

use std::sync::Arc;
use std::time::Duration;

use biogate::metrics::names;
use biogate::qr::QrRecord;
use biogate::token::TokenClaims;
use biogate::{AuthMethod, CeremonyError, Config, Coordinator, MemoryStore, RecordingSink};

fn coordinator_with(config: Config) -> (Coordinator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let coordinator =
        Coordinator::new(config, Arc::new(MemoryStore::new()), sink.clone()).unwrap();
    (coordinator, sink)
}

fn coordinator() -> (Coordinator, Arc<RecordingSink>) {
    coordinator_with(Config::default())
}

fn decode_claims(token: &str) -> TokenClaims {
    jsonwebtoken::decode::<TokenClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(Config::default().jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .unwrap()
    .claims
}

#[tokio::test]
async fn test_generate_produces_png_data_url() {
    let (coordinator, sink) = coordinator();
    let challenge = coordinator
        .qr()
        .generate("alice", serde_json::Value::Null)
        .await
        .unwrap();

    assert!(challenge.image.starts_with("data:image/png;base64,"));
    let record: QrRecord = serde_json::from_str(&challenge.token).unwrap();
    assert_eq!(record.subject, "alice");
    assert!((5..=7).contains(&record.nonce.len()));
    assert_eq!(
        sink.counter_value(names::QR_GENERATIONS, &[("result", "success")]),
        1
    );
}

#[tokio::test]
async fn test_validate_is_one_shot() {
    let (coordinator, sink) = coordinator();
    let challenge = coordinator
        .qr()
        .generate("alice", serde_json::json!({"purpose": "login"}))
        .await
        .unwrap();

    let issued = coordinator.qr().validate(&challenge.token).await.unwrap();
    let claims = decode_claims(&issued.token);
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.method, AuthMethod::Qr);

    // The record was consumed; presenting the same token again fails.
    let err = coordinator.qr().validate(&challenge.token).await.unwrap_err();
    assert!(matches!(err, CeremonyError::NotFoundOrExpired));

    assert_eq!(
        sink.counter_value(names::QR_VALIDATIONS, &[("result", "success")]),
        1
    );
    assert_eq!(
        sink.counter_value(names::QR_VALIDATIONS, &[("result", "failed")]),
        1
    );
    assert_eq!(
        sink.counter_value(names::AUTH_ATTEMPTS, &[("method", "qr"), ("result", "success")]),
        1
    );
}

#[tokio::test]
async fn test_malformed_token_rejected_before_store_access() {
    let (coordinator, sink) = coordinator();
    let err = coordinator.qr().validate("not json at all").await.unwrap_err();
    assert!(matches!(err, CeremonyError::Validation(_)));
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_tampered_subject_rejected() {
    let (coordinator, _) = coordinator();
    let challenge = coordinator
        .qr()
        .generate("alice", serde_json::Value::Null)
        .await
        .unwrap();

    // Rewrite the subject while keeping the real nonce. The lookup key no
    // longer matches any stored record.
    let mut record: QrRecord = serde_json::from_str(&challenge.token).unwrap();
    record.subject = "mallory".to_string();
    let forged = serde_json::to_string(&record).unwrap();

    let err = coordinator.qr().validate(&forged).await.unwrap_err();
    assert!(matches!(err, CeremonyError::NotFoundOrExpired));

    // The original token is still valid; the forgery consumed nothing.
    coordinator.qr().validate(&challenge.token).await.unwrap();
}

#[tokio::test]
async fn test_expired_challenge_rejected() {
    let config = Config {
        qr_ttl: Duration::from_millis(50),
        ..Config::default()
    };
    let (coordinator, _) = coordinator_with(config);
    let challenge = coordinator
        .qr()
        .generate("alice", serde_json::Value::Null)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = coordinator.qr().validate(&challenge.token).await.unwrap_err();
    assert!(matches!(err, CeremonyError::NotFoundOrExpired));
}

#[tokio::test]
async fn test_concurrent_challenges_for_one_subject() {
    let (coordinator, _) = coordinator();
    let a = coordinator
        .qr()
        .generate("alice", serde_json::Value::Null)
        .await
        .unwrap();
    let b = coordinator
        .qr()
        .generate("alice", serde_json::Value::Null)
        .await
        .unwrap();

    // Each nonce keys its own record, so both validate independently.
    coordinator.qr().validate(&b.token).await.unwrap();
    coordinator.qr().validate(&a.token).await.unwrap();
}
