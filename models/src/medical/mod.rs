// models/src/medical/mod.rs
pub mod dosage;
pub mod facility;
pub mod medication;
pub mod patient;
pub mod role;
pub mod user;

pub use dosage::Dosage;
pub use facility::{Facility, FacilitySummary, FacilityType, NewFacility, NewFacilityAdmin};
pub use medication::{Medication, MedicationState};
pub use patient::{normalize_entries, split_entries, NewPatient, Patient, PatientUpdate, PublicPatient};
pub use role::Role;
pub use user::{normalize_email, Login, NewStaff, NewUser, User, UserView, PASSWORD_HASH_COST};
