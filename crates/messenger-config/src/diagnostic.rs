// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors into miette diagnostics with
//! source spans, valid key listings, and "did you mean?" suggestions using
//! Jaro-Winkler string similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(messenger::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest valid key, if any is similar enough.
        suggestion: Option<String>,
        /// Comma-separated valid keys of the section.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(messenger::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(messenger::config::missing_key),
        help("add `{key} = <value>` to your messenger.toml")
    )]
    MissingKey { key: String },

    /// A value deserialized but breaks a semantic rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(messenger::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(messenger::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert_one(&error, toml_sources))
        .collect()
}

fn convert_one(error: &figment::Error, toml_sources: &[(String, String)]) -> ConfigError {
    use figment::error::Kind;

    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let valid_keys: Vec<&str> = expected.to_vec();
            let (span, src) = find_source_span(error, field, toml_sources);
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, &valid_keys),
                valid_keys: valid_keys.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: field.clone().into_owned(),
        },
        Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
            key: error
                .path
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("."),
            detail: format!("found {actual}, expected {expected}"),
            expected: expected.to_string(),
            span: None,
            src: None,
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Locate `field` in the TOML file the error came from.
fn find_source_span(
    error: &figment::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(origin) = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        })
    else {
        return (None, None);
    };

    let Some((path, content)) = toml_sources.iter().find(|(p, _)| *p == origin) else {
        return (None, None);
    };

    let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
    match find_key_offset(content, &section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// For `path = ["gateway"]` and `field = "prot"`, finds the `[gateway]` header
/// then searches for `prot` after it. Top-level fields are searched from the start.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut line_start = search_start;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        let is_key = trimmed
            .strip_prefix(field)
            .is_some_and(|after| after.starts_with([' ', '\t', '=']));
        if is_key {
            return Some(line_start + (line.len() - trimmed.len()));
        }
        line_start += line.len();
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_prot_for_port() {
        let valid = &["enabled", "host", "port", "api_keys"];
        assert_eq!(suggest_key("prot", valid), Some("port".to_string()));
    }

    #[test]
    fn suggest_default_locale_for_transposed_typo() {
        let valid = &["default_locale", "auto_resume_minutes", "history_limit"];
        assert_eq!(
            suggest_key("defualt_locale", valid),
            Some("default_locale".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        assert_eq!(suggest_key("zzzzzz", &["level"]), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[logging]\nlevel = \"info\"\n[gateway]\nprot = 80\n";
        let path = vec!["gateway".to_string()];
        let o = find_key_offset(content, &path, "prot").expect("key should be found");
        assert_eq!(&content[o..o + 4], "prot");
    }

    #[test]
    fn find_key_offset_skips_prefix_matches() {
        let content = "[engine]\nhistory_limit_x = 1\nhistory_limit = 2\n";
        let path = vec!["engine".to_string()];
        let o = find_key_offset(content, &path, "history_limit").expect("key should be found");
        assert!(content[o..].starts_with("history_limit = 2"));
    }
}
