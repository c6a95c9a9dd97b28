// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the messenger conversation engine.
//!
//! This crate provides the error type, the domain types, and the adapter
//! traits every other crate in the workspace builds on.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MessengerError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{AuthAdapter, EmbeddingAdapter, PluginAdapter, ProviderAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use chrono::Utc;

    #[test]
    fn adapter_type_round_trips_through_strum() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Provider,
            AdapterType::Storage,
            AdapterType::Embedding,
            AdapterType::Auth,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn locale_normalization() {
        assert_eq!(Locale::normalize("fr-CA"), Locale::Fr);
        assert_eq!(Locale::normalize("HE"), Locale::He);
        assert_eq!(Locale::normalize("iw-IL"), Locale::He);
        assert_eq!(Locale::normalize("en-US"), Locale::En);
        assert_eq!(Locale::normalize("de"), Locale::En);
        assert_eq!(Locale::normalize(""), Locale::En);
    }

    #[test]
    fn localized_text_falls_back_without_error() {
        let text = LocalizedText {
            fr: Some("Bonjour".into()),
            en: None,
            he: Some("   ".into()),
        };
        assert_eq!(text.resolve(Locale::He, Locale::En), "Bonjour");
        assert_eq!(text.resolve(Locale::Fr, Locale::En), "Bonjour");
        assert_eq!(LocalizedText::default().resolve(Locale::En, Locale::Fr), "");

        let text = LocalizedText {
            fr: Some("Oui".into()),
            en: Some("Yes".into()),
            he: None,
        };
        assert_eq!(text.resolve(Locale::He, Locale::Fr), "Oui");
    }

    #[test]
    fn module_definition_is_tagged_by_module_type() {
        let json = serde_json::json!({
            "module_type": "choice",
            "choices": [
                {"id": "a", "label": {"en": "A"}, "next_step_ref": "X"},
                {"id": "b", "label": {"en": "B"}}
            ]
        });
        let def: ModuleDefinition = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(def.module_type(), ModuleType::Choice);
        let choices = def.choices().expect("choice module");
        assert_eq!(choices[0].next_step_ref.as_deref(), Some("X"));
        assert!(choices[1].next_step_ref.is_none());

        let def: ModuleDefinition =
            serde_json::from_value(serde_json::json!({"module_type": "llm_delegated"}))
                .expect("llm config defaults");
        assert_eq!(def.llm_config(), Some(&LlmConfig::default()));
    }

    #[test]
    fn validated_field_without_format_is_a_workflow_error() {
        let err = ModuleDefinition::from_parts(ModuleType::ValidatedField, None, None, None)
            .unwrap_err();
        assert!(matches!(err, MessengerError::WorkflowConfig(_)));
    }

    #[test]
    fn module_draft_rejects_duplicate_choice_ids() {
        let draft: ModuleDraft = serde_json::from_value(serde_json::json!({
            "ref_code": "CONFIRM",
            "module_type": "choice",
            "choices": [
                {"id": "yes", "label": {"en": "Yes"}},
                {"id": "yes", "label": {"en": "Yes again"}}
            ]
        }))
        .expect("should deserialize");
        assert_eq!(draft.category, "general");
        assert!(draft.is_active);
        assert!(matches!(
            draft.validate(),
            Err(MessengerError::InvalidInput(_))
        ));
    }

    #[test]
    fn only_active_is_open() {
        assert!(!ConversationStatus::Active.is_terminal());
        assert!(ConversationStatus::Completed.is_terminal());
        assert!(ConversationStatus::Abandoned.is_terminal());
        assert_eq!(ConversationStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn faq_embedding_text_joins_every_locale() {
        let now = Utc::now();
        let faq = FaqEntry {
            id: "f1".into(),
            category: "general".into(),
            question: LocalizedText {
                fr: Some("Horaires ?".into()),
                en: Some("Opening hours?".into()),
                he: None,
            },
            answer: LocalizedText::single(Locale::En, "9 to 5"),
            order_index: 0,
            is_active: true,
            embedding: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(faq.embedding_text(), "Horaires ? Opening hours? 9 to 5");
    }

    #[test]
    fn not_found_helper_formats_entity() {
        let err = MessengerError::not_found("conversation", "abc");
        assert_eq!(err.to_string(), "conversation not found: abc");
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_provider_adapter<T: ProviderAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_embedding_adapter<T: EmbeddingAdapter>() {}
        fn _assert_auth_adapter<T: AuthAdapter>() {}
    }
}
