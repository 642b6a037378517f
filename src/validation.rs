//! Boundary input validation
//!
//! Malformed input is rejected before any store access. Subjects are embedded
//! in colon-delimited store keys, so their character set is restricted.

use crate::error::CeremonyError;

const SUBJECT_MIN: usize = 3;
const SUBJECT_MAX: usize = 50;
const SAMPLE_MIN_BYTES: usize = 100;

/// Validate a subject identifier: 3-50 chars, no key-delimiter characters
pub fn subject(subject: &str) -> Result<(), CeremonyError> {
    if subject.len() < SUBJECT_MIN || subject.len() > SUBJECT_MAX {
        return Err(CeremonyError::Validation(format!(
            "subject must be {SUBJECT_MIN}-{SUBJECT_MAX} characters"
        )));
    }
    if !subject
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
    {
        return Err(CeremonyError::Validation(
            "subject may only contain alphanumerics, '_', '-', '.', '@'".to_string(),
        ));
    }
    Ok(())
}

/// Validate a display name: 3-50 chars
pub fn display_name(name: &str) -> Result<(), CeremonyError> {
    if name.len() < SUBJECT_MIN || name.len() > SUBJECT_MAX {
        return Err(CeremonyError::Validation(format!(
            "display name must be {SUBJECT_MIN}-{SUBJECT_MAX} characters"
        )));
    }
    Ok(())
}

/// Validate a biometric sample blob: at least 100 bytes
pub fn sample(sample: &[u8]) -> Result<(), CeremonyError> {
    if sample.len() < SAMPLE_MIN_BYTES {
        return Err(CeremonyError::Validation(format!(
            "sample must be at least {SAMPLE_MIN_BYTES} bytes"
        )));
    }
    Ok(())
}
