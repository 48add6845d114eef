// models/src/lib.rs
//! Domain types of the healthcare records portal: accounts and roles,
//! facilities, patient records with their embedded medications, and the
//! error taxonomy every other crate speaks.

pub mod errors;
pub mod identifiers;
pub mod medical;

pub use errors::{PortalError, PortalResult, ValidationError, ValidationResult};
pub use identifiers::PatientId;
