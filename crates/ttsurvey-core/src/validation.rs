//! Intake form validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// At least two characters once surrounding whitespace is removed.
pub fn is_valid_name(name: &str) -> bool {
    name.trim().chars().count() >= 2
}

/// What the participant typed on the intake form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeForm {
    pub name: String,
    pub email: String,
    /// `None` until the eligibility question is answered.
    pub is_native_speaker: Option<bool>,
}

impl IntakeForm {
    /// All field errors at once, in form order, so they can be shown inline.
    pub fn field_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !is_valid_name(&self.name) {
            errors.push(ValidationError::NameTooShort);
        }
        if !is_valid_email(self.email.trim()) {
            errors.push(ValidationError::InvalidEmail(self.email.clone()));
        }
        if self.is_native_speaker.is_none() {
            errors.push(ValidationError::EligibilityUnanswered);
        }
        errors
    }

    /// Validate the form. Eligibility is checked only once the fields are valid.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors = self.field_errors();
        if !errors.is_empty() {
            return Err(errors);
        }
        if self.is_native_speaker == Some(false) {
            return Err(vec![ValidationError::NotEligible]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("no-at.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("nodot@example"));
    }

    #[test]
    fn names() {
        assert!(is_valid_name("Al"));
        assert!(is_valid_name("  דן "));
        assert!(!is_valid_name(" A "));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn form_reports_every_field() {
        let form = IntakeForm::default();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], ValidationError::NameTooShort);
        assert_eq!(errors[2], ValidationError::EligibilityUnanswered);
    }

    #[test]
    fn ineligible_participant() {
        let form = IntakeForm {
            name: "Random Tester".into(),
            email: "random@test.com".into(),
            is_native_speaker: Some(false),
        };
        assert_eq!(form.validate().unwrap_err(), vec![ValidationError::NotEligible]);
    }

    #[test]
    fn valid_form() {
        let form = IntakeForm {
            name: "Random Tester".into(),
            email: "random@test.com".into(),
            is_native_speaker: Some(true),
        };
        assert!(form.validate().is_ok());
    }
}
