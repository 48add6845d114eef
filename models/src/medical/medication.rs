// models/src/medical/medication.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PortalError, PortalResult, ValidationError, ValidationResult};
use crate::medical::Dosage;

/// Where a medication sits in its dispense/refill lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MedicationState {
    /// Prescribed but never handed over.
    Pending,
    /// Handed over; no refills remain.
    DispensedExhausted,
    /// Handed over; at least one refill remains.
    DispensedRefillable,
}

/// A prescription line embedded in a patient record. It has no identity of
/// its own: it is addressed by name, case-insensitively, within its patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub prescribed_quantity: u32,
    pub prescribed_by: String,
    pub dosage: Dosage,
    #[serde(default)]
    pub dispensed: bool,
    #[serde(default)]
    pub dispensed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refillable: bool,
    #[serde(default)]
    pub refills_left: u32,
}

impl Medication {
    pub fn new(name: &str, prescribed_quantity: u32, prescribed_by: &str, dosage: Dosage) -> Self {
        Medication {
            name: name.trim().to_string(),
            prescribed_quantity,
            prescribed_by: prescribed_by.trim().to_string(),
            dosage,
            dispensed: false,
            dispensed_at: None,
            refillable: false,
            refills_left: 0,
        }
    }

    pub fn with_refills(mut self, refills: u32) -> Self {
        self.refills_left = refills;
        self.refillable = refills > 0;
        self
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }

    pub fn state(&self) -> MedicationState {
        if !self.dispensed {
            MedicationState::Pending
        } else if self.refillable && self.refills_left > 0 {
            MedicationState::DispensedRefillable
        } else {
            MedicationState::DispensedExhausted
        }
    }

    /// True when a dispense call would be accepted.
    pub fn can_dispense(&self) -> bool {
        self.state() != MedicationState::DispensedExhausted
    }

    /// Applies one dispense.
    ///
    /// A medication that was already dispensed and has no refills left is
    /// refused with `InvalidState` and left untouched. Otherwise it is marked
    /// dispensed at `now`, and a refillable medication with refills remaining
    /// consumes one; consuming the last one clears `refillable`.
    pub fn dispense(&mut self, now: DateTime<Utc>) -> PortalResult<MedicationState> {
        if !self.can_dispense() {
            return Err(PortalError::InvalidState(format!(
                "Medication '{}' has already been dispensed and has no refills left",
                self.name
            )));
        }

        self.dispensed = true;
        self.dispensed_at = Some(now);

        if self.refillable && self.refills_left > 0 {
            self.refills_left -= 1;
            if self.refills_left == 0 {
                self.refillable = false;
            }
        }

        Ok(self.state())
    }

    /// Required-field checks applied to prescriptions entered by providers.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("medication name"));
        }
        if self.prescribed_quantity == 0 {
            return Err(ValidationError::InvalidValue(format!(
                "prescribedQuantity for '{}' must be greater than zero",
                self.name
            )));
        }
        if self.prescribed_by.trim().is_empty() {
            return Err(ValidationError::MissingField("prescribedBy"));
        }
        if let Some(field) = self.dosage.first_missing() {
            return Err(ValidationError::MissingField(field));
        }
        Ok(())
    }

    /// Refillable and refill count are stored consistently: a refillable
    /// medication with nothing left is non-refillable, and a non-refillable
    /// one carries no refills.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        if self.refills_left == 0 {
            self.refillable = false;
        }
        if !self.refillable {
            self.refills_left = 0;
        }
    }
}
