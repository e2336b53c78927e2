//! Opt-in message checks. Violations are reported, never enforced.

use cidwatch_core::MessageBody;
use cidwatch_settings::ValidationSettings;
use serde_json::Value;

/// Why a message failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Subject matches none of the allowed prefixes.
    SubjectDisallowed,
    /// `mint` absent, null or empty.
    MissingMint,
    /// `image` absent, null or empty.
    MissingImage,
}

impl Violation {
    /// Value of the `reason` field.
    pub fn reason(self) -> &'static str {
        match self {
            Self::SubjectDisallowed => "subject_disallowed",
            Self::MissingMint => "missing_mint",
            Self::MissingImage => "missing_image",
        }
    }
}

/// Applies [`ValidationSettings`] to decoded messages.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    settings: ValidationSettings,
}

impl Validator {
    /// Validator with the given rules.
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    /// Every rule `body` breaks; empty when validation is off.
    pub fn check(&self, subject: &str, body: &MessageBody) -> Vec<Violation> {
        let rules = &self.settings;
        if !rules.enabled {
            return Vec::new();
        }

        let mut violations = Vec::new();
        if !rules.allowed_subject_prefixes.is_empty()
            && !rules
                .allowed_subject_prefixes
                .iter()
                .any(|prefix| subject.starts_with(prefix.as_str()))
        {
            violations.push(Violation::SubjectDisallowed);
        }
        if rules.require_mint && is_missing(body.mint.as_ref()) {
            violations.push(Violation::MissingMint);
        }
        if rules.require_image && is_missing(body.image.as_ref()) {
            violations.push(Violation::MissingImage);
        }
        violations
    }
}

/// Absent, null and empty strings count as missing; other types do not.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
