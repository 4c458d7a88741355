//! Query composer: assembles the ordered message sequence for one question.
//!
//! The sequence is always `system`, optional profile context, `question`.
//! The profile segment is left out entirely when there is nothing to say
//! about the patient.

use pocketmed_core::message::Message;
use pocketmed_core::profile::PatientProfile;

/// Default instructions sent as the first segment of every query.
pub const SYSTEM_PROMPT: &str = "\
You are PocketMed, a calm, concise diabetes information assistant and connected to an electronic health record.

- Your user is a person living with diabetes (mostly type 2) or at risk of diabetes, mostly old age.
- Use simple, clear language. Always answer in fluent Persian.
- Give short answers (2–4 sentences).
- Base your answers on standard diabetes education (lifestyle, monitoring, medications) but DO NOT give exact prescriptions, doses, or treatment orders.
- Always consider the patient's personal info if provided (age, diabetes type, medications, lab values, other conditions).
- If a situation sounds urgent (e.g. very high sugar with symptoms, chest pain, confusion, severe shortness of breath), tell them to seek immediate medical care.";

/// The role-tagged segments sent verbatim to the model for one question.
#[derive(Debug, Clone)]
pub struct ComposedQuery {
    messages: Vec<Message>,
}

impl ComposedQuery {
    pub fn segments(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Whether a profile-context segment was included.
    pub fn has_profile_context(&self) -> bool {
        self.messages.len() == 3
    }

    /// The question text, always the last segment.
    pub fn question(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct QueryComposer {
    system_prompt: String,
}

impl Default for QueryComposer {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT)
    }
}

impl QueryComposer {
    /// A composer with custom instructions. Surrounding whitespace is stripped.
    pub fn new(system_prompt: impl AsRef<str>) -> Self {
        Self {
            system_prompt: system_prompt.as_ref().trim().to_string(),
        }
    }

    /// Use `prompt` when set, the built-in instructions otherwise.
    pub fn with_override(prompt: Option<&str>) -> Self {
        match prompt.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => Self::new(p),
            None => Self::default(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build the query for `question`. Never fails; the question is passed
    /// through untouched.
    pub fn compose(&self, question: &str, profile: Option<&PatientProfile>) -> ComposedQuery {
        let mut messages = Vec::with_capacity(3);
        messages.push(Message::system(&self.system_prompt));

        if let Some(profile) = profile.filter(|p| !p.is_empty()) {
            messages.push(Message::user(profile.format()));
        }

        messages.push(Message::user(question));
        ComposedQuery { messages }
    }
}
