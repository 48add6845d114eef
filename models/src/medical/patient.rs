// models/src/medical/patient.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::PatientId;
use crate::medical::Medication;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub name: String,
    pub gender: String,
    pub email: Option<String>,
    pub emergency_contact: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<String>,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub current_infections: Vec<String>,
    pub current_medications: Vec<Medication>,
    /// Hospital whose admin registered the record. Informational only:
    /// patients form one pool shared across facilities.
    pub registered_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn medication(&self, name: &str) -> Option<&Medication> {
        self.current_medications.iter().find(|m| m.matches_name(name))
    }

    pub fn medication_mut(&mut self, name: &str) -> Option<&mut Medication> {
        self.current_medications.iter_mut().find(|m| m.matches_name(name))
    }

    /// Case-insensitive substring match on name or patient id. An empty term
    /// matches everyone.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.name.to_lowercase().contains(&term)
            || self.patient_id.to_lowercase().contains(&term)
    }

    /// The reduced record served to anonymous QR-code scans.
    pub fn public_view(&self) -> PublicPatient {
        PublicPatient {
            name: self.name.clone(),
            patient_id: self.patient_id.clone(),
            blood_type: self.blood_type.clone(),
            allergies: self.allergies.clone(),
            chronic_conditions: self.chronic_conditions.clone(),
        }
    }
}

/// Fields safe to show without authentication. Deliberately has no
/// medication or infection fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPatient {
    pub name: String,
    pub patient_id: PatientId,
    pub blood_type: Option<String>,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
}

/// Registration form submitted by a hospital's facility admin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default, deserialize_with = "clinical_list")]
    pub allergies: Vec<String>,
    #[serde(default, deserialize_with = "clinical_list")]
    pub chronic_conditions: Vec<String>,
    #[serde(default, deserialize_with = "clinical_list")]
    pub current_infections: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<Medication>,
}

impl NewPatient {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.gender.trim().is_empty() {
            return Err(ValidationError::MissingField("gender"));
        }
        check_birth_date(self.date_of_birth)?;
        self.current_medications.iter().try_for_each(Medication::validate)
    }

    pub fn into_patient(self, patient_id: PatientId, registered_by: Option<Uuid>) -> ValidationResult<Patient> {
        self.validate()?;
        let now = Utc::now();
        Ok(Patient {
            id: Uuid::new_v4(),
            patient_id,
            name: self.name.trim().to_string(),
            gender: self.gender.trim().to_string(),
            email: non_blank(self.email),
            emergency_contact: non_blank(self.emergency_contact),
            date_of_birth: self.date_of_birth,
            blood_type: non_blank(self.blood_type),
            allergies: normalize_entries(self.allergies),
            chronic_conditions: normalize_entries(self.chronic_conditions),
            current_infections: normalize_entries(self.current_infections),
            current_medications: normalize_medications(self.current_medications),
            registered_by,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A partial record. Each field that is present replaces the stored value
/// wholesale; absent fields are left alone. Optional fields distinguish
/// "absent" (`None`) from "cleared" (`Some(None)`).
///
/// `patientId`, `id`, `registeredBy` and `createdAt` have no slot here, so
/// clients cannot rewrite them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub emergency_contact: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub blood_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "optional_clinical_list")]
    pub allergies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_clinical_list")]
    pub chronic_conditions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_clinical_list")]
    pub current_infections: Option<Vec<String>>,
    #[serde(default)]
    pub current_medications: Option<Vec<Medication>>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.gender.is_none()
            && self.email.is_none()
            && self.emergency_contact.is_none()
            && self.date_of_birth.is_none()
            && self.blood_type.is_none()
            && self.allergies.is_none()
            && self.chronic_conditions.is_none()
            && self.current_infections.is_none()
            && self.current_medications.is_none()
    }

    /// Validates the whole update before touching `patient`, so a rejected
    /// update leaves the record unchanged.
    pub fn apply(self, patient: &mut Patient) -> ValidationResult<()> {
        if matches!(self.name.as_deref(), Some(n) if n.trim().is_empty()) {
            return Err(ValidationError::MissingField("name"));
        }
        if matches!(self.gender.as_deref(), Some(g) if g.trim().is_empty()) {
            return Err(ValidationError::MissingField("gender"));
        }
        if let Some(dob) = self.date_of_birth {
            check_birth_date(dob)?;
        }
        if let Some(meds) = &self.current_medications {
            meds.iter().try_for_each(Medication::validate)?;
        }

        if self.is_empty() {
            return Ok(());
        }

        if let Some(name) = self.name {
            patient.name = name.trim().to_string();
        }
        if let Some(gender) = self.gender {
            patient.gender = gender.trim().to_string();
        }
        if let Some(email) = self.email {
            patient.email = non_blank(email);
        }
        if let Some(contact) = self.emergency_contact {
            patient.emergency_contact = non_blank(contact);
        }
        if let Some(dob) = self.date_of_birth {
            patient.date_of_birth = dob;
        }
        if let Some(blood_type) = self.blood_type {
            patient.blood_type = non_blank(blood_type);
        }
        if let Some(allergies) = self.allergies {
            patient.allergies = normalize_entries(allergies);
        }
        if let Some(conditions) = self.chronic_conditions {
            patient.chronic_conditions = normalize_entries(conditions);
        }
        if let Some(infections) = self.current_infections {
            patient.current_infections = normalize_entries(infections);
        }
        if let Some(meds) = self.current_medications {
            patient.current_medications = normalize_medications(meds);
        }
        patient.updated_at = Utc::now();
        Ok(())
    }
}

/// Trims entries, drops blanks, and removes case-insensitive duplicates while
/// keeping the first spelling and the original order.
pub fn normalize_entries<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.as_ref().trim();
            (!entry.is_empty() && seen.insert(entry.to_lowercase())).then(|| entry.to_string())
        })
        .collect()
}

/// Splits form input such as `"Penicillin, Dust"` into entries.
pub fn split_entries(raw: &str) -> Vec<String> {
    normalize_entries(raw.split(','))
}

fn normalize_medications(mut meds: Vec<Medication>) -> Vec<Medication> {
    meds.iter_mut().for_each(Medication::normalize);
    meds
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_birth_date(dob: Option<NaiveDate>) -> ValidationResult<()> {
    match dob {
        Some(date) if date > Utc::now().date_naive() => Err(ValidationError::InvalidValue(
            "dateOfBirth cannot be in the future".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClinicalListInput {
    Text(String),
    Entries(Vec<String>),
}

impl From<ClinicalListInput> for Vec<String> {
    fn from(input: ClinicalListInput) -> Self {
        match input {
            ClinicalListInput::Text(raw) => split_entries(&raw),
            ClinicalListInput::Entries(entries) => normalize_entries(entries),
        }
    }
}

fn clinical_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ClinicalListInput>::deserialize(deserializer).map(|input| input.map(Vec::from).unwrap_or_default())
}

fn optional_clinical_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    // null clears the list
    Option::<ClinicalListInput>::deserialize(deserializer).map(|input| Some(input.map(Vec::from).unwrap_or_default()))
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
