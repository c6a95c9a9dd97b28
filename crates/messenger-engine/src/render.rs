// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module renderer: turns a module into a prompt and interprets replies.
//!
//! Rendering never fails on a missing translation; text falls back to the
//! default locale and then to any locale present. Prompts may reference
//! collected answers with `{{STEP_REF}}` placeholders; collected dates and
//! times are shown in the conversation's locale.

use messenger_core::MessengerError;
use messenger_core::types::{
    Choice, CollectedData, Locale, LocalizedText, Module, ModuleDefinition, ModuleType,
    ValidationFormat,
};
use serde::Serialize;

use crate::datetime::display_value;
use crate::validation::ValidationRegistry;

/// Minimum Jaro-Winkler similarity for a fuzzy label match.
const FUZZY_THRESHOLD: f64 = 0.85;

/// A choice as shown to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedChoice {
    pub id: String,
    pub label: String,
    /// 1-based position, accepted back as a typed reply.
    pub value: usize,
}

/// A module resolved for one locale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPrompt {
    pub text: String,
    pub module_type: ModuleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<RenderedChoice>>,
}

impl RenderedPrompt {
    /// The same prompt with `prefix` placed before its text.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim();
        if !prefix.is_empty() {
            self.text = if self.text.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}\n\n{}", self.text)
            };
        }
        self
    }
}

/// How a reply fits the module of the current step.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// Store `value` and move on; `next_step_ref` comes from a picked choice.
    Accepted {
        value: String,
        next_step_ref: Option<String>,
    },
    /// Stay on the step and show `error`.
    Rejected { error: String },
    /// Free text that matched no choice; FAQ lookup may still answer it.
    NoChoiceMatch { error: String },
    /// A validated value that is a guess; read it back before storing it.
    Confirm { value: String },
    /// The reply goes to the assistant.
    Delegated,
}

/// Collected-data key holding the value awaiting confirmation on `step_ref`.
pub fn pending_key(step_ref: &str) -> String {
    format!("{step_ref}_PENDING")
}

/// A reply to a yes/no confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Unclear,
}

impl Confirmation {
    /// Reads a picked choice id, else the typed reply.
    pub fn of(reply: &str, choice_id: Option<&str>) -> Self {
        let answer = choice_id.unwrap_or(reply).trim().to_lowercase();
        match answer.as_str() {
            "yes" | "y" | "oui" | "o" | "כן" | "1" => Self::Yes,
            "no" | "n" | "non" | "לא" | "2" => Self::No,
            _ => Self::Unclear,
        }
    }
}

/// Renderer bound to one conversation's locale and answers.
pub struct Renderer<'a> {
    pub locale: Locale,
    pub fallback: Locale,
    pub collected: &'a CollectedData,
}

impl<'a> Renderer<'a> {
    pub fn new(locale: Locale, fallback: Locale, collected: &'a CollectedData) -> Self {
        Self {
            locale,
            fallback,
            collected,
        }
    }

    pub fn text(&self, text: &LocalizedText) -> String {
        fill_placeholders(
            text.resolve(self.locale, self.fallback),
            self.collected,
            self.locale,
        )
    }

    /// Localized `text`, or the built-in `default` when it is absent or blank.
    fn message_or(&self, text: Option<&LocalizedText>, default: &LocalizedText) -> String {
        match text.filter(|t| !t.is_empty()) {
            Some(text) => self.text(text),
            None => self.text(default),
        }
    }

    pub fn render(&self, module: &Module) -> RenderedPrompt {
        let choices = module.definition.choices().map(|choices| {
            choices
                .iter()
                .enumerate()
                .map(|(i, choice)| RenderedChoice {
                    id: choice.id.clone(),
                    label: self.label(choice),
                    value: i + 1,
                })
                .collect()
        });
        RenderedPrompt {
            text: self.text(&module.content),
            module_type: module.module_type(),
            choices,
        }
    }

    /// "You mean: February 5, 2026?" with Yes and No choices.
    pub fn confirmation(&self, value: &str) -> RenderedPrompt {
        let question = self
            .text(&defaults::you_mean())
            .replace("{value}", &display_value(value, self.locale));
        let choice = |id: &str, label: LocalizedText, value| RenderedChoice {
            id: id.to_string(),
            label: self.text(&label),
            value,
        };
        RenderedPrompt {
            text: question,
            module_type: ModuleType::Choice,
            choices: Some(vec![
                choice("yes", defaults::yes(), 1),
                choice("no", defaults::no(), 2),
            ]),
        }
    }

    fn label(&self, choice: &Choice) -> String {
        let label = choice.label.resolve(self.locale, self.fallback);
        if label.is_empty() {
            choice.id.clone()
        } else {
            label.to_string()
        }
    }

    /// Interprets `reply` for `module`.
    ///
    /// `format` must be the resolved validation format of a validated-field
    /// module; its absence there is a configuration error.
    pub fn interpret(
        &self,
        module: &Module,
        reply: &str,
        choice_id: Option<&str>,
        registry: &ValidationRegistry,
        format: Option<&ValidationFormat>,
    ) -> Result<Interpretation, MessengerError> {
        let reply = reply.trim();
        match &module.definition {
            ModuleDefinition::FreeText => Ok(if reply.is_empty() {
                Interpretation::Rejected {
                    error: self.message_or(
                        module.custom_error_message.as_ref(),
                        &defaults::empty_reply(),
                    ),
                }
            } else {
                Interpretation::Accepted {
                    value: reply.to_string(),
                    next_step_ref: None,
                }
            }),

            ModuleDefinition::Choice { choices } => {
                let picked = match choice_id.map(str::trim).filter(|id| !id.is_empty()) {
                    Some(id) => choices.iter().find(|c| c.id == id),
                    None => self.match_choice(choices, reply),
                };
                let error = || {
                    self.message_or(
                        module
                            .failure_message
                            .as_ref()
                            .or(module.custom_error_message.as_ref()),
                        &defaults::unknown_choice(),
                    )
                };
                Ok(match picked {
                    Some(choice) => Interpretation::Accepted {
                        value: self.label(choice),
                        next_step_ref: choice.next_step_ref.clone(),
                    },
                    None if choice_id.is_some() || reply.is_empty() => {
                        Interpretation::Rejected { error: error() }
                    }
                    None => Interpretation::NoChoiceMatch { error: error() },
                })
            }

            ModuleDefinition::ValidatedField {
                validation_format_code,
            } => {
                let format = format.ok_or_else(|| {
                    MessengerError::workflow(format!(
                        "module `{}` references missing validation format `{validation_format_code}`",
                        module.ref_code
                    ))
                })?;
                let result =
                    registry.validate(format, reply, module.custom_error_message.as_ref())?;
                Ok(match result.normalized_value {
                    Some(value) if result.valid && result.needs_confirmation => {
                        Interpretation::Confirm { value }
                    }
                    Some(value) if result.valid => Interpretation::Accepted {
                        value,
                        next_step_ref: None,
                    },
                    _ => Interpretation::Rejected {
                        error: self.message_or(
                            result.error_message.as_ref(),
                            &defaults::invalid_value(),
                        ),
                    },
                })
            }

            ModuleDefinition::LlmDelegated { .. } => Ok(Interpretation::Delegated),
        }
    }

    /// Best-effort match of a typed reply against the choices, in order:
    /// id, exact label (conversation locale, then any), 1-based position,
    /// containment, then fuzzy similarity.
    pub fn match_choice<'c>(&self, choices: &'c [Choice], reply: &str) -> Option<&'c Choice> {
        let input = reply.trim().to_lowercase();
        if input.is_empty() {
            return None;
        }
        let localized = |c: &Choice| self.label(c).to_lowercase();

        if let Some(choice) = choices.iter().find(|c| c.id.to_lowercase() == input) {
            return Some(choice);
        }
        if let Some(choice) = choices.iter().find(|c| localized(c) == input) {
            return Some(choice);
        }
        if let Some(choice) = choices
            .iter()
            .find(|c| c.label.values().any(|label| label.trim().to_lowercase() == input))
        {
            return Some(choice);
        }
        if let Ok(position) = input.parse::<usize>() {
            if position >= 1 {
                if let Some(choice) = choices.get(position - 1) {
                    return Some(choice);
                }
            }
        }

        let chars = input.chars().count();
        if chars >= 2 {
            let contained = choices.iter().find(|c| {
                let label = localized(c);
                !label.is_empty() && (label.contains(&input) || input.contains(&label))
            });
            if contained.is_some() {
                return contained;
            }
        }
        if chars >= 3 {
            return choices
                .iter()
                .map(|c| (strsim::jaro_winkler(&input, &localized(c)), c))
                .filter(|(score, _)| *score >= FUZZY_THRESHOLD)
                .max_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, c)| c);
        }
        None
    }
}

/// Replaces `{{KEY}}` with the collected value for `KEY` as shown in
/// `locale`, or nothing.
pub fn fill_placeholders(template: &str, collected: &CollectedData, locale: Locale) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) if is_placeholder_key(after[..end].trim()) => {
                let key = after[..end].trim();
                if let Some(value) = collected.get(key) {
                    out.push_str(&display_value(value, locale));
                }
                rest = &after[end + 2..];
            }
            _ => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Built-in messages used when a module defines none.
pub(crate) mod defaults {
    use messenger_core::types::LocalizedText;

    fn text(fr: &str, en: &str, he: &str) -> LocalizedText {
        LocalizedText {
            fr: Some(fr.to_string()),
            en: Some(en.to_string()),
            he: Some(he.to_string()),
        }
    }

    pub fn empty_reply() -> LocalizedText {
        text(
            "Merci de saisir une réponse.",
            "Please type an answer.",
            "נא להקליד תשובה.",
        )
    }

    pub fn unknown_choice() -> LocalizedText {
        text(
            "Merci de choisir une des options proposées.",
            "Please pick one of the options.",
            "נא לבחור באחת האפשרויות.",
        )
    }

    pub fn invalid_value() -> LocalizedText {
        text(
            "Cette valeur n'est pas valide.",
            "This value is not valid.",
            "הערך אינו תקין.",
        )
    }

    /// `{value}` is replaced with the value being confirmed.
    pub fn you_mean() -> LocalizedText {
        text(
            "Vous voulez dire : {value} ?",
            "You mean: {value}?",
            "אתה מתכוון: {value}?",
        )
    }

    pub fn yes() -> LocalizedText {
        text("Oui", "Yes", "כן")
    }

    pub fn no() -> LocalizedText {
        text("Non", "No", "לא")
    }

    pub fn answer_yes_or_no() -> LocalizedText {
        text(
            "Veuillez répondre par Oui ou Non.",
            "Please answer Yes or No.",
            "אנא ענה כן או לא.",
        )
    }

    pub fn enter_again() -> LocalizedText {
        text(
            "D'accord, veuillez entrer à nouveau :",
            "Okay, please enter it again:",
            "בסדר, אנא הזן שוב:",
        )
    }
}
