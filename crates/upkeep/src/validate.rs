//! Input validation for contact details and free text.

use regex::Regex;

use crate::error::{Error, Result};

/// Accepted email shape: something@something.tld, no spaces.
pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Default phone shape: digits with optional leading `+`, spaces, dots,
/// dashes and parentheses, 7 to 20 characters.
pub const DEFAULT_PHONE_PATTERN: &str = r"^\+?[0-9 ().-]{7,20}$";

/// Compiled contact validation rules.
#[derive(Debug, Clone)]
pub struct ContactRules {
    email: Regex,
    phone: Regex,
}

impl ContactRules {
    /// Build rules with a custom phone pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the pattern does not compile.
    pub fn new(phone_pattern: &str) -> Result<Self> {
        let phone = Regex::new(phone_pattern).map_err(|e| Error::ConfigValidation {
            message: format!("validation.phone_pattern is not a valid regex: {e}"),
        })?;
        Ok(Self {
            email: email_regex(),
            phone,
        })
    }

    /// Trim and check an email address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address is malformed.
    pub fn email(&self, value: &str) -> Result<String> {
        let value = value.trim();
        if self.email.is_match(value) {
            Ok(value.to_string())
        } else {
            Err(Error::validation(
                "email",
                format!("'{value}' is not a valid email address"),
            ))
        }
    }

    /// Trim and check an optional phone number; blank counts as absent.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a non-blank number is malformed.
    pub fn phone(&self, value: Option<&str>) -> Result<Option<String>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) if self.phone.is_match(v) => Ok(Some(v.to_string())),
            Some(v) => Err(Error::validation(
                "phone",
                format!("'{v}' is not a valid phone number"),
            )),
        }
    }

    /// Like [`ContactRules::email`], for optional addresses.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a non-blank address is malformed.
    pub fn optional_email(&self, value: Option<&str>) -> Result<Option<String>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => self.email(v).map(Some),
        }
    }
}

impl Default for ContactRules {
    fn default() -> Self {
        Self {
            email: email_regex(),
            phone: Regex::new(DEFAULT_PHONE_PATTERN).expect("Invalid regex pattern"),
        }
    }
}

/// # Panics
///
/// Panics if [`EMAIL_PATTERN`] is invalid.
fn email_regex() -> Regex {
    Regex::new(EMAIL_PATTERN).expect("Invalid regex pattern")
}

/// Trim a required text field.
///
/// # Errors
///
/// Returns a validation error if the value is blank.
pub fn required_text(field: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::validation(field, "must not be blank"))
    } else {
        Ok(value.to_string())
    }
}

/// Trim an optional text field; blank counts as absent.
#[must_use]
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        let rules = ContactRules::default();
        assert_eq!(rules.email(" ada@example.com ").unwrap(), "ada@example.com");
        assert!(rules.email("ada@example").is_err());
        assert!(rules.email("ada example@x.io").is_err());
        assert!(rules.email("").unwrap_err().is_validation());
    }

    #[test]
    fn test_optional_email() {
        let rules = ContactRules::default();
        assert_eq!(rules.optional_email(Some("  ")).unwrap(), None);
        assert!(rules.optional_email(Some("nope")).is_err());
    }

    #[test]
    fn test_phone_default_pattern() {
        let rules = ContactRules::default();
        assert_eq!(
            rules.phone(Some("+1 (555) 010-0199")).unwrap().as_deref(),
            Some("+1 (555) 010-0199")
        );
        assert_eq!(rules.phone(None).unwrap(), None);
        assert_eq!(rules.phone(Some("")).unwrap(), None);
        assert!(rules.phone(Some("call me")).is_err());
    }

    #[test]
    fn test_custom_phone_pattern() {
        let rules = ContactRules::new(r"^\d{4}$").unwrap();
        assert!(rules.phone(Some("1234")).is_ok());
        assert!(rules.phone(Some("12345")).is_err());

        let err = ContactRules::new("(").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(required_text("name", "  Ada ").unwrap(), "Ada");
        assert!(required_text("name", "   ").is_err());
        assert_eq!(optional_text(Some(" x ")).as_deref(), Some("x"));
        assert_eq!(optional_text(Some(" ")), None);
    }
}
