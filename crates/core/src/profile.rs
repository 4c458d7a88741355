//! Patient profile: the structured record a user builds through chat
//! commands, and its compact natural-language rendering.

use serde::{Deserialize, Serialize};

/// Returned by [`PatientProfile::format`] when no field would be rendered.
pub const NO_PROFILE_SENTINEL: &str = "No specific patient profile was provided";

const PROFILE_PREFIX: &str = "Patient profile: ";
const PART_SEPARATOR: &str = " | ";
const LIST_SEPARATOR: &str = ", ";

/// Self-reported, diabetes-relevant attributes of one user.
///
/// `None` means "never set" and is never rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diabetes_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_years: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medications: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_conditions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_hba1c: Option<f64>,
}

/// The fields of a [`PatientProfile`], in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Age,
    Gender,
    DiabetesType,
    DurationYears,
    Medications,
    OtherConditions,
    LatestHba1c,
}

impl ProfileField {
    pub const ALL: [ProfileField; 7] = [
        ProfileField::Age,
        ProfileField::Gender,
        ProfileField::DiabetesType,
        ProfileField::DurationYears,
        ProfileField::Medications,
        ProfileField::OtherConditions,
        ProfileField::LatestHba1c,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Age => "age",
            ProfileField::Gender => "gender",
            ProfileField::DiabetesType => "diabetes_type",
            ProfileField::DurationYears => "duration_years",
            ProfileField::Medications => "medications",
            ProfileField::OtherConditions => "other_conditions",
            ProfileField::LatestHba1c => "latest_hba1c",
        }
    }
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, already-coerced value for exactly one profile field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    Age(u32),
    Gender(String),
    DiabetesType(String),
    DurationYears(f64),
    Medications(Vec<String>),
    OtherConditions(Vec<String>),
    LatestHba1c(f64),
}

impl FieldUpdate {
    pub fn field(&self) -> ProfileField {
        match self {
            FieldUpdate::Age(_) => ProfileField::Age,
            FieldUpdate::Gender(_) => ProfileField::Gender,
            FieldUpdate::DiabetesType(_) => ProfileField::DiabetesType,
            FieldUpdate::DurationYears(_) => ProfileField::DurationYears,
            FieldUpdate::Medications(_) => ProfileField::Medications,
            FieldUpdate::OtherConditions(_) => ProfileField::OtherConditions,
            FieldUpdate::LatestHba1c(_) => ProfileField::LatestHba1c,
        }
    }
}

impl PatientProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite one field. Last write wins; other fields are untouched.
    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Age(v) => self.age = Some(v),
            FieldUpdate::Gender(v) => self.gender = Some(v),
            FieldUpdate::DiabetesType(v) => self.diabetes_type = Some(v),
            FieldUpdate::DurationYears(v) => self.duration_years = Some(v),
            FieldUpdate::Medications(v) => self.medications = v,
            FieldUpdate::OtherConditions(v) => self.other_conditions = v,
            FieldUpdate::LatestHba1c(v) => self.latest_hba1c = Some(v),
        }
    }

    /// Labeled parts for every field that has something to show, in field order.
    fn parts(&self) -> Vec<String> {
        let mut parts = Vec::new();

        if let Some(age) = self.age {
            parts.push(format!("Age: {age}"));
        }
        if let Some(gender) = self.gender.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Gender: {gender}"));
        }
        if let Some(dtype) = self.diabetes_type.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Diabetes_type: {dtype}"));
        }
        if let Some(years) = self.duration_years {
            parts.push(format!("Diabetes duration (years): {years}"));
        }
        if !self.medications.is_empty() {
            parts.push(format!("Current medication: {}", self.medications.join(LIST_SEPARATOR)));
        }
        if !self.other_conditions.is_empty() {
            parts.push(format!("Other conditions: {}", self.other_conditions.join(LIST_SEPARATOR)));
        }
        if let Some(hba1c) = self.latest_hba1c {
            parts.push(format!("Latest HbA1c: {hba1c}"));
        }

        parts
    }

    /// True when [`format`](Self::format) would return the sentinel.
    pub fn is_empty(&self) -> bool {
        self.parts().is_empty()
    }

    /// Render the profile as a single line for the language model.
    ///
    /// Deterministic: the same profile state always yields the same string.
    pub fn format(&self) -> String {
        let parts = self.parts();
        if parts.is_empty() {
            return NO_PROFILE_SENTINEL.to_string();
        }
        format!("{PROFILE_PREFIX}{}", parts.join(PART_SEPARATOR))
    }
}
