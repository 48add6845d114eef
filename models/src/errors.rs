// models/src/errors.rs

pub use thiserror::Error;
use bcrypt::BcryptError;
use serde_json::Error as SerdeJsonError;

/// Errors shared by every layer of the portal. The REST layer maps each
/// variant onto exactly one HTTP status.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] BcryptError),

    #[error("An internal error occurred: {0}")]
    Internal(String),

    #[cfg(feature = "sled-errors")]
    #[error(transparent)]
    Sled(#[from] sled::Error),
}

impl PortalError {
    pub fn not_found(what: impl Into<String>) -> Self {
        PortalError::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortalError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        PortalError::Forbidden(message.into())
    }
}

impl From<SerdeJsonError> for PortalError {
    fn from(err: SerdeJsonError) -> Self {
        PortalError::Serialization(format!("JSON processing error: {}", err))
    }
}

#[cfg(feature = "bincode-errors")]
impl From<bincode::error::EncodeError> for PortalError {
    fn from(err: bincode::error::EncodeError) -> Self {
        PortalError::Serialization(format!("bincode encode error: {}", err))
    }
}

#[cfg(feature = "bincode-errors")]
impl From<bincode::error::DecodeError> for PortalError {
    fn from(err: bincode::error::DecodeError) -> Self {
        PortalError::Serialization(format!("bincode decode error: {}", err))
    }
}

impl From<uuid::Error> for PortalError {
    fn from(err: uuid::Error) -> Self {
        PortalError::Validation(ValidationError::InvalidValue(format!("invalid id: {}", err)))
    }
}

/// A validation error on client-supplied input.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// Several required fields were absent; carries the original wording.
    #[error("{0}")]
    MissingFields(String),
    /// A field held a value outside its domain.
    #[error("{0}")]
    InvalidValue(String),
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("Invalid facility type: {0}")]
    InvalidFacilityType(String),
    #[error("Invalid staff role")]
    InvalidStaffRole,
    #[error("patient id '{0}' is malformed")]
    InvalidPatientId(String),
}

/// A type alias for a `Result` that returns a `PortalError` on failure.
pub type PortalResult<T> = Result<T, PortalError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
