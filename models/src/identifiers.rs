// models/src/identifiers.rs

use core::ops::Deref;
use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};

/// Prefix carried by every generated patient id.
pub const PATIENT_ID_PREFIX: &str = "PT-";

/// Number of random characters following the prefix.
pub const PATIENT_ID_RANDOM_LEN: usize = 8;

const PATIENT_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PATIENT_ID_MAX_LEN: usize = 64;

/// The human-facing patient identifier printed on QR codes and typed into
/// search boxes. Distinct from the record's internal UUID.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    /// Wraps an existing id.
    ///
    /// Ids registered before generation was introduced (e.g. `abc123`) are
    /// still valid lookup keys, so only the character set and length are
    /// checked here.
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidPatientId` when the value is empty,
    /// longer than 64 bytes, or contains characters other than ASCII
    /// alphanumerics, `-` and `_`.
    pub fn new(value: String) -> ValidationResult<Self> {
        let well_formed = !value.is_empty()
            && value.len() <= PATIENT_ID_MAX_LEN
            && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !well_formed {
            return Err(ValidationError::InvalidPatientId(value));
        }
        Ok(Self(value))
    }

    /// Draws a fresh id from the thread-local RNG. Uniqueness is the
    /// caller's job: storage rejects a colliding insert and the caller draws
    /// again.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut id = String::with_capacity(PATIENT_ID_PREFIX.len() + PATIENT_ID_RANDOM_LEN);
        id.push_str(PATIENT_ID_PREFIX);
        for _ in 0..PATIENT_ID_RANDOM_LEN {
            let idx = rng.gen_range(0..PATIENT_ID_ALPHABET.len());
            id.push(PATIENT_ID_ALPHABET[idx] as char);
        }
        Self(id)
    }

    /// True when the id has the shape produced by [`PatientId::generate`].
    pub fn is_generated(&self) -> bool {
        self.0
            .strip_prefix(PATIENT_ID_PREFIX)
            .map(|rest| {
                rest.len() == PATIENT_ID_RANDOM_LEN
                    && rest.bytes().all(|b| PATIENT_ID_ALPHABET.contains(&b))
            })
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for PatientId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for PatientId {
    type Err = ValidationError;

    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::new(s.to_string())
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PatientId> for String {
    fn from(value: PatientId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::PatientId;
    use crate::errors::ValidationError;
    use core::str::FromStr;
    use std::collections::HashSet;

    #[test]
    fn should_not_create_empty_patient_id() {
        let id = PatientId::new("".to_string());
        assert_eq!(id.unwrap_err(), ValidationError::InvalidPatientId(String::new()));
    }

    #[test]
    fn should_not_create_too_long_patient_id() {
        assert!(PatientId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn should_reject_path_characters() {
        assert!(PatientId::from_str("../etc").is_err());
        assert!(PatientId::from_str("ab cd").is_err());
    }

    #[test]
    fn should_accept_legacy_ids() {
        let id = PatientId::from_str("abc123").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert!(!id.is_generated());
    }

    #[test]
    fn should_generate_well_formed_ids() {
        for _ in 0..100 {
            let id = PatientId::generate();
            assert!(id.is_generated(), "unexpected shape: {}", id);
            assert!(PatientId::new(id.to_string()).is_ok());
        }
    }

    #[test]
    fn should_rarely_collide() {
        let ids: HashSet<PatientId> = (0..1000).map(|_| PatientId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
