//! Command classifier: turns one raw chat message into an [`Action`].
//!
//! A message is a profile update when it starts with a field keyword, a
//! summary request when it equals the summary keyword, and a free-text
//! question otherwise. Classification is pure: it never touches the store.

use pocketmed_config::KeywordConfig;
use pocketmed_core::error::ProfileError;
use pocketmed_core::profile::{FieldUpdate, ProfileField};

const LIST_DELIMITER: char = ',';

/// What a chat message asks the assistant to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Overwrite one profile field with an already-coerced value.
    FieldUpdate(FieldUpdate),
    /// Show the stored profile.
    SummaryRequest,
    /// Anything else: a medical question for the language model.
    Question(String),
}

/// Keyword table for classification, checked in priority order.
#[derive(Debug, Clone)]
pub struct Classifier {
    prefixes: Vec<(ProfileField, String)>,
    summary: String,
}

impl Classifier {
    pub fn from_config(keywords: &KeywordConfig) -> Self {
        let mut prefixes = vec![
            (ProfileField::Age, keywords.age.clone()),
            (ProfileField::Gender, keywords.gender.clone()),
            (ProfileField::DiabetesType, keywords.diabetes_type.clone()),
            (ProfileField::Medications, keywords.medications.clone()),
        ];

        let optional = [
            (ProfileField::DurationYears, &keywords.duration_years),
            (ProfileField::OtherConditions, &keywords.other_conditions),
            (ProfileField::LatestHba1c, &keywords.latest_hba1c),
        ];
        for (field, keyword) in optional {
            if let Some(keyword) = keyword {
                prefixes.push((field, keyword.clone()));
            }
        }

        Self {
            prefixes,
            summary: keywords.summary.to_lowercase(),
        }
    }

    /// The prefix keyword that updates `field`, if one is configured.
    pub fn keyword_for(&self, field: ProfileField) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, k)| k.as_str())
    }

    /// Classify a message. Fails only when an update's value cannot be
    /// coerced to the field's type.
    pub fn classify(&self, raw: &str) -> Result<Action, ProfileError> {
        let text = raw.trim();

        for (field, keyword) in &self.prefixes {
            if let Some(rest) = text.strip_prefix(keyword.as_str()) {
                return parse_value(*field, rest).map(Action::FieldUpdate);
            }
        }

        if text.to_lowercase() == self.summary {
            return Ok(Action::SummaryRequest);
        }

        Ok(Action::Question(text.to_string()))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&KeywordConfig::default())
    }
}

/// Coerce the text after a keyword into a typed update for `field`.
pub fn parse_value(field: ProfileField, raw: &str) -> Result<FieldUpdate, ProfileError> {
    let value = raw.trim();
    let invalid = || ProfileError::Validation {
        field,
        value: value.to_string(),
    };

    let update = match field {
        ProfileField::Age => {
            FieldUpdate::Age(normalize_digits(value).parse().map_err(|_| invalid())?)
        }
        ProfileField::Gender => FieldUpdate::Gender(value.to_string()),
        ProfileField::DiabetesType => FieldUpdate::DiabetesType(value.to_string()),
        ProfileField::DurationYears => {
            FieldUpdate::DurationYears(parse_measure(value).ok_or_else(invalid)?)
        }
        ProfileField::Medications => FieldUpdate::Medications(split_list(value)),
        ProfileField::OtherConditions => FieldUpdate::OtherConditions(split_list(value)),
        ProfileField::LatestHba1c => {
            FieldUpdate::LatestHba1c(parse_measure(value).ok_or_else(invalid)?)
        }
    };

    Ok(update)
}

/// Split on the list delimiter, trimming items and dropping empty ones.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// A finite, non-negative decimal.
fn parse_measure(value: &str) -> Option<f64> {
    normalize_digits(value)
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
}

/// Map Persian and Arabic-Indic digits (and the Arabic decimal separator)
/// to ASCII so `"۶۵"` parses like `"65"`.
fn normalize_digits(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            '٫' => '.',
            _ => c,
        })
        .collect()
}
