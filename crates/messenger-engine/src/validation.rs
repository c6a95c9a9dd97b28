// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation format registry.
//!
//! A [`ValidationFormat`] names either a regex, a validator function
//! registered here, or both. Functions normalize the raw reply (a phone
//! number loses its separators and country prefix) and the regex, when
//! present, is tested against the normalized value.
//!
//! Inactive formats, unknown function names and patterns that do not compile
//! are workflow configuration errors, not rejected replies.
//!
//! A function may mark its normalized value as needing confirmation; the
//! `date` and `time` validators do so for guesses such as a missing year.

use std::collections::HashMap;

use chrono::Local;
use dashmap::DashMap;
use messenger_core::MessengerError;
use messenger_core::types::{LocalizedText, ValidationFormat};
use regex::Regex;
use serde::Serialize;

use crate::datetime::{Parsed, parse_date, parse_time};

/// Normalizes a reply, or returns `None` when it is not acceptable.
pub type ValidatorFn = fn(&str) -> Option<Parsed>;

/// Characters dropped from replies before a second regex attempt.
const SEPARATORS: &[char] = &[' ', '-', '.', '(', ')', '/'];

/// Outcome of validating one reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
    /// Set when `valid` is false: the module override, else the format message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<LocalizedText>,
    /// The value is a guess to read back before storing.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub needs_confirmation: bool,
}

impl ValidationResult {
    fn valid(value: String, needs_confirmation: bool) -> Self {
        Self {
            valid: true,
            normalized_value: Some(value),
            error_message: None,
            needs_confirmation,
        }
    }

    fn invalid(message: LocalizedText) -> Self {
        Self {
            valid: false,
            normalized_value: None,
            error_message: Some(message),
            needs_confirmation: false,
        }
    }
}

pub struct ValidationRegistry {
    functions: HashMap<String, ValidatorFn>,
    patterns: DashMap<String, Regex>,
}

impl Default for ValidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationRegistry {
    /// A registry with the built-in `israeli_phone`, `email`, `date` and
    /// `time` validators.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
            patterns: DashMap::new(),
        };
        registry.register("israeli_phone", |s| normalize_israeli_phone(s).map(Parsed::from));
        registry.register("email", |s| normalize_email(s).map(Parsed::from));
        registry.register("date", |s| parse_date(s, Local::now().date_naive()));
        registry.register("time", parse_time);
        registry
    }

    /// Registers (or replaces) a named validator function.
    pub fn register(&mut self, name: impl Into<String>, function: ValidatorFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Checks that `format` can be applied: it is active, its function is
    /// registered and its pattern compiles.
    pub fn check(&self, format: &ValidationFormat) -> Result<(), MessengerError> {
        if !format.is_active {
            return Err(MessengerError::workflow(format!(
                "validation format `{}` is inactive",
                format.format_code
            )));
        }
        if let Some(name) = &format.validation_function {
            if !self.has_function(name) {
                return Err(MessengerError::workflow(format!(
                    "validation format `{}` names unknown function `{name}`",
                    format.format_code
                )));
            }
        }
        if let Some(pattern) = &format.validation_regex {
            self.with_pattern(pattern, |_| ())?;
        }
        Ok(())
    }

    /// Validates `raw` against `format`. `error_override` (the module's own
    /// message) replaces the format's message on failure.
    pub fn validate(
        &self,
        format: &ValidationFormat,
        raw: &str,
        error_override: Option<&LocalizedText>,
    ) -> Result<ValidationResult, MessengerError> {
        self.check(format)?;
        let error = || {
            error_override
                .filter(|text| !text.is_empty())
                .unwrap_or(&format.error_message)
                .clone()
        };

        let input = raw.trim();
        if input.is_empty() {
            return Ok(ValidationResult::invalid(error()));
        }

        let (normalized, needs_confirmation) = match &format.validation_function {
            Some(name) => {
                let function = self.functions.get(name).copied().ok_or_else(|| {
                    MessengerError::workflow(format!("unknown validation function `{name}`"))
                })?;
                match function(input) {
                    Some(parsed) => (parsed.value, parsed.ambiguous),
                    None => return Ok(ValidationResult::invalid(error())),
                }
            }
            None => (input.to_string(), false),
        };

        let Some(pattern) = &format.validation_regex else {
            return Ok(ValidationResult::valid(normalized, needs_confirmation));
        };

        let accepted = self.with_pattern(pattern, |re| {
            if re.is_match(&normalized) {
                return Some(normalized.clone());
            }
            if format.validation_function.is_some() {
                return None;
            }
            let stripped = strip_separators(&normalized);
            re.is_match(&stripped).then_some(stripped)
        })?;

        Ok(match accepted {
            Some(value) => ValidationResult::valid(value, needs_confirmation),
            None => ValidationResult::invalid(error()),
        })
    }

    fn with_pattern<T>(
        &self,
        pattern: &str,
        f: impl FnOnce(&Regex) -> T,
    ) -> Result<T, MessengerError> {
        if let Some(re) = self.patterns.get(pattern) {
            return Ok(f(re.value()));
        }
        let re = Regex::new(pattern).map_err(|e| {
            MessengerError::workflow(format!("invalid validation regex `{pattern}`: {e}"))
        })?;
        let out = f(&re);
        self.patterns.insert(pattern.to_string(), re);
        Ok(out)
    }
}

fn strip_separators(input: &str) -> String {
    input.chars().filter(|c| !SEPARATORS.contains(c)).collect()
}

/// Israeli mobile (`05` + 8 digits) or landline (`0[2-489]` + 7 digits)
/// number in local form.
pub fn normalize_israeli_phone(input: &str) -> Option<String> {
    let digits = strip_separators(input);
    let digits = digits.strip_prefix('+').unwrap_or(&digits);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let local = match digits.strip_prefix("972") {
        Some(rest) if rest.len() >= 8 => format!("0{}", rest.trim_start_matches('0')),
        _ if digits.len() == 9 && digits.starts_with('5') => format!("0{digits}"),
        _ => digits.to_string(),
    };

    let bytes = local.as_bytes();
    let valid = match bytes {
        [b'0', b'5', rest @ ..] => rest.len() == 8,
        [b'0', area, rest @ ..] => {
            matches!(*area, b'2' | b'3' | b'4' | b'8' | b'9') && rest.len() == 7
        }
        _ => false,
    };
    valid.then_some(local)
}

pub fn normalize_email(input: &str) -> Option<String> {
    let email = input.trim().to_lowercase();
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let (host, tld) = domain.rsplit_once('.')?;
    let labels_ok = host.split('.').all(|label| !label.is_empty());
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());
    (labels_ok && tld_ok).then_some(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_core::types::Locale;
    use proptest::prelude::*;

    fn format(regex: Option<&str>, function: Option<&str>) -> ValidationFormat {
        ValidationFormat {
            format_code: "test".into(),
            format_name: "Test".into(),
            validation_regex: regex.map(str::to_string),
            validation_function: function.map(str::to_string),
            error_message: LocalizedText::single(Locale::En, "Invalid value."),
            description: None,
            is_active: true,
        }
    }

    #[test]
    fn regex_format_normalizes_separators() {
        let registry = ValidationRegistry::new();
        let format = format(Some(r"^05\d{8}$"), None);

        let ok = registry.validate(&format, "05 8626-6770", None).unwrap();
        assert!(ok.valid);
        assert_eq!(ok.normalized_value.as_deref(), Some("0586266770"));

        let bad = registry.validate(&format, "12345", None).unwrap();
        assert!(!bad.valid);
        assert_eq!(
            bad.error_message.unwrap().get(Locale::En),
            Some("Invalid value.")
        );
    }

    #[test]
    fn module_message_overrides_format_message() {
        let registry = ValidationRegistry::new();
        let custom = LocalizedText::single(Locale::En, "Ten digits please.");
        let result = registry
            .validate(&format(Some(r"^\d{10}$"), None), "abc", Some(&custom))
            .unwrap();
        assert_eq!(result.error_message, Some(custom));

        let blank = LocalizedText::default();
        let result = registry
            .validate(&format(Some(r"^\d{10}$"), None), "abc", Some(&blank))
            .unwrap();
        assert_eq!(
            result.error_message.unwrap().get(Locale::En),
            Some("Invalid value.")
        );
    }

    #[test]
    fn function_runs_before_regex() {
        let registry = ValidationRegistry::new();
        let format = format(Some(r"^0(5\d{8}|[2-489]\d{7})$"), Some("israeli_phone"));
        let result = registry.validate(&format, "+972 50-123-4567", None).unwrap();
        assert_eq!(result.normalized_value.as_deref(), Some("0501234567"));

        let mobile_only = self::format(Some(r"^05\d{8}$"), Some("israeli_phone"));
        assert!(!registry.validate(&mobile_only, "03-1234567", None).unwrap().valid);
    }

    #[test]
    fn configuration_problems_are_errors() {
        let registry = ValidationRegistry::new();
        let mut inactive = format(Some(".*"), None);
        inactive.is_active = false;
        assert!(matches!(
            registry.validate(&inactive, "x", None),
            Err(MessengerError::WorkflowConfig(_))
        ));
        assert!(matches!(
            registry.validate(&format(None, Some("nope")), "x", None),
            Err(MessengerError::WorkflowConfig(_))
        ));
        assert!(matches!(
            registry.validate(&format(Some("(unclosed"), None), "x", None),
            Err(MessengerError::WorkflowConfig(_))
        ));
    }

    #[test]
    fn blank_reply_is_rejected() {
        let registry = ValidationRegistry::new();
        assert!(!registry.validate(&format(Some(".*"), None), "   ", None).unwrap().valid);
    }

    #[test]
    fn custom_functions_can_be_registered() {
        fn upper(input: &str) -> Option<Parsed> {
            Some(input.to_uppercase().into())
        }
        let mut registry = ValidationRegistry::new();
        registry.register("upper", upper);
        let result = registry
            .validate(&format(Some("^[A-Z]+$"), Some("upper")), "abc", None)
            .unwrap();
        assert_eq!(result.normalized_value.as_deref(), Some("ABC"));
    }

    #[test]
    fn israeli_phone_forms() {
        assert_eq!(normalize_israeli_phone("050-1234567").as_deref(), Some("0501234567"));
        assert_eq!(normalize_israeli_phone("972501234567").as_deref(), Some("0501234567"));
        assert_eq!(normalize_israeli_phone("+972-3-123-4567").as_deref(), Some("031234567"));
        assert_eq!(normalize_israeli_phone("501234567").as_deref(), Some("0501234567"));
        assert_eq!(normalize_israeli_phone("(02) 123.4567").as_deref(), Some("021234567"));
        assert_eq!(normalize_israeli_phone("0601234567"), None);
        assert_eq!(normalize_israeli_phone("05012345"), None);
        assert_eq!(normalize_israeli_phone("050-123456a"), None);
    }

    #[test]
    fn email_shape() {
        assert_eq!(normalize_email(" Dana@Example.co.IL ").as_deref(), Some("dana@example.co.il"));
        assert_eq!(normalize_email("dana@example"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("da na@example.com"), None);
        assert_eq!(normalize_email("dana@@example.com"), None);
        assert_eq!(normalize_email("dana@example..com"), None);
    }

    #[test]
    fn date_and_time_guesses_ask_for_confirmation() {
        let registry = ValidationRegistry::new();
        let date = format(None, Some("date"));
        let exact = registry.validate(&date, "09/03/2026", None).unwrap();
        assert_eq!(exact.normalized_value.as_deref(), Some("2026-03-09"));
        assert!(!exact.needs_confirmation);

        let no_year = registry.validate(&date, "5 février", None).unwrap();
        assert!(no_year.valid);
        assert!(no_year.needs_confirmation);
        assert!(no_year.normalized_value.unwrap().ends_with("-02-05"));

        let time = format(Some(r"^\d{2}:\d{2}$"), Some("time"));
        let afternoon = registry.validate(&time, "2:30 pm", None).unwrap();
        assert_eq!(afternoon.normalized_value.as_deref(), Some("14:30"));
        assert!(!afternoon.needs_confirmation);
        let bare = registry.validate(&time, "3h", None).unwrap();
        assert_eq!(bare.normalized_value.as_deref(), Some("03:00"));
        assert!(bare.needs_confirmation);

        assert!(!registry.validate(&time, "teatime", None).unwrap().valid);
    }

    proptest! {
        #[test]
        fn mobile_numbers_normalize_from_any_prefix(rest in "[0-9]{8}") {
            let local = format!("05{rest}");
            let expected = Some(local.clone());
            prop_assert_eq!(normalize_israeli_phone(&local), expected.clone());
            prop_assert_eq!(normalize_israeli_phone(&format!("+9725{rest}")), expected.clone());
            prop_assert_eq!(normalize_israeli_phone(&format!("9725{rest}")), expected.clone());
            prop_assert_eq!(normalize_israeli_phone(&format!("5{rest}")), expected.clone());
            let dashed = format!("05{}-{}", &rest[..1], &rest[1..]);
            prop_assert_eq!(normalize_israeli_phone(&dashed), expected);
        }

        #[test]
        fn normalized_phones_are_fixed_points(input in "[0-9 +()./-]{0,16}") {
            if let Some(local) = normalize_israeli_phone(&input) {
                prop_assert!(local.starts_with('0'));
                prop_assert!(local.len() == 9 || local.len() == 10);
                prop_assert_eq!(normalize_israeli_phone(&local), Some(local.clone()));
            }
        }
    }
}
