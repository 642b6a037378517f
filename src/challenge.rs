//! Challenge generation
//!
//! Produces unguessable, ceremony-scoped random material from the OS CSPRNG.
//! WebAuthn challenges travel base64url-encoded without padding; decoding
//! accepts both padded and unpadded forms because browser clients disagree on
//! which one they send.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::error::CeremonyError;

/// Smallest challenge the generator will produce
pub const MIN_CHALLENGE_BYTES: usize = 16;

/// Generate `byte_len` random bytes from a cryptographically secure source
pub fn generate(byte_len: usize) -> Result<Vec<u8>, CeremonyError> {
    if byte_len < MIN_CHALLENGE_BYTES {
        return Err(CeremonyError::Validation(format!(
            "challenge length {byte_len} below minimum of {MIN_CHALLENGE_BYTES} bytes"
        )));
    }
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    Ok(bytes)
}

/// Canonical wire encoding: base64url without padding
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url, accepting both padded and unpadded input
pub fn decode(encoded: &str) -> Result<Vec<u8>, CeremonyError> {
    URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| CeremonyError::Validation(format!("invalid base64url: {e}")))
}

/// Short alphanumeric token used as a QR challenge store-key suffix.
///
/// 5-7 lowercase characters; not a security boundary by itself, the opaque QR
/// payload is the secret.
pub fn qr_token() -> String {
    let len = OsRng.gen_range(5..=7);
    (0..len)
        .map(|_| OsRng.sample(Alphanumeric) as char)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
