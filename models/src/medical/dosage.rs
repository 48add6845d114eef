// models/src/medical/dosage.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dosage {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub instructions: String,
}

impl Dosage {
    /// Name of the first blank field, if any.
    pub fn first_missing(&self) -> Option<&'static str> {
        if self.amount.trim().is_empty() {
            Some("dosage.amount")
        } else if self.frequency.trim().is_empty() {
            Some("dosage.frequency")
        } else if self.instructions.trim().is_empty() {
            Some("dosage.instructions")
        } else {
            None
        }
    }
}
