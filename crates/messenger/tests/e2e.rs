// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete messenger pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite, mock adapters,
//! and the seeded booking workflow. Tests are independent and order-insensitive.

use messenger_config::MessengerConfig;
use messenger_core::types::{
    ConversationStatus, FaqDraft, LlmConfig, LocalizedText, MessageRole, ModuleDefinition,
    ModuleDraft, StepDraft, WorkflowDraft,
};
use messenger_engine::types::TurnOutcome;
use messenger_test_utils::TestHarness;

fn en(text: &str) -> LocalizedText {
    LocalizedText {
        en: Some(text.to_string()),
        ..Default::default()
    }
}

/// Replaces the booking workflow with a single delegated step.
async fn activate_assistant_workflow(harness: &TestHarness) {
    let workflow = harness
        .storage
        .create_workflow(&WorkflowDraft {
            name: "Questions".into(),
            description: None,
            is_active: true,
        })
        .await
        .unwrap();
    harness
        .storage
        .create_module(&ModuleDraft {
            ref_code: "ASSIST".into(),
            name: "Assistant".into(),
            content: en("Ask me anything about the clinic."),
            params: serde_json::Value::Null,
            definition: ModuleDefinition::LlmDelegated {
                llm_config: LlmConfig::default(),
            },
            custom_error_message: None,
            success_message: None,
            failure_message: None,
            category: "general".into(),
            is_active: true,
        })
        .await
        .unwrap();
    harness
        .storage
        .create_step(
            &workflow.id,
            &StepDraft {
                step_ref: "ASK".into(),
                step_name: "Ask".into(),
                module_ref: "ASSIST".into(),
                is_entry_point: true,
                order_index: None,
                next_step_ref: None,
            },
        )
        .await
        .unwrap();
}

// ---- Workflow pipeline ----

#[tokio::test]
async fn test_booking_flow_persists_transcript_and_data() {
    let harness = TestHarness::builder().build().await.unwrap();
    let id = harness.start("web-1").await.unwrap().conversation_id;

    harness.reply(&id, "Dana").await.unwrap();
    let phone = harness.reply(&id, "+972 50-123-4567").await.unwrap();
    assert_eq!(phone.outcome, TurnOutcome::Advanced);
    assert_eq!(phone.next_step_ref.as_deref(), Some("CONFIRM"));
    let done = harness.choose(&id, "yes").await.unwrap();
    assert_eq!(done.outcome, TurnOutcome::Completed);
    assert!(done.next_step_ref.is_none());

    let conversation = harness.storage.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(conversation.status, ConversationStatus::Completed);
    assert!(conversation.completed_at.is_some());
    assert_eq!(
        conversation.collected_data.get("ASK_PHONE").map(String::as_str),
        Some("0501234567")
    );

    let messages = harness.storage.list_messages(&id).await.unwrap();
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
        ]
    );
    assert_eq!(messages[1].content, "Dana");
    assert_eq!(messages[6].content, "Thank you, see you soon!");
}

#[tokio::test]
async fn test_invalid_reply_keeps_the_step_and_records_the_turn() {
    let harness = TestHarness::builder().build().await.unwrap();
    let id = harness.start("web-1").await.unwrap().conversation_id;
    harness.reply(&id, "Dana").await.unwrap();

    let rejected = harness.reply(&id, "not a phone").await.unwrap();
    assert_eq!(rejected.outcome, TurnOutcome::Rejected);
    assert_eq!(rejected.next_step_ref.as_deref(), Some("ASK_PHONE"));

    let conversation = harness.storage.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(conversation.current_step_ref.as_deref(), Some("ASK_PHONE"));
    assert!(!conversation.collected_data.contains_key("ASK_PHONE"));
    let messages = harness.storage.list_messages(&id).await.unwrap();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[3].content, "not a phone");
}

#[tokio::test]
async fn test_start_resumes_an_active_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    let first = harness.start("web-1").await.unwrap();
    harness.reply(&first.conversation_id, "Dana").await.unwrap();

    let again = harness.start("web-1").await.unwrap();
    assert!(again.resumed);
    assert_eq!(again.conversation_id, first.conversation_id);
    assert_eq!(again.step_ref, "ASK_PHONE");
    assert_eq!(
        harness
            .storage
            .list_messages(&first.conversation_id)
            .await
            .unwrap()
            .len(),
        3
    );

    let other = harness.start("web-2").await.unwrap();
    assert!(!other.resumed);
    assert_ne!(other.conversation_id, first.conversation_id);
}

// ---- FAQ and escalation ----

#[tokio::test]
async fn test_faq_answers_off_script_questions() {
    let harness = TestHarness::builder()
        .with_embedder()
        .with_faq(FaqDraft {
            category: "access".into(),
            question: en("Is there parking?"),
            answer: en("Yes, behind the building."),
            order_index: 0,
            is_active: true,
        })
        .build()
        .await
        .unwrap();
    let id = harness.start("web-1").await.unwrap().conversation_id;
    harness.reply(&id, "Dana").await.unwrap();
    harness.reply(&id, "0501234567").await.unwrap();

    let answered = harness.reply(&id, "Is there parking?").await.unwrap();
    assert_eq!(answered.outcome, TurnOutcome::Answered);
    assert!(answered.message.contains("behind the building"));
    assert_eq!(answered.next_step_ref.as_deref(), Some("CONFIRM"));
    assert!(!answered.needs_human);
}

#[tokio::test]
async fn test_faq_miss_escalates_when_configured() {
    let mut config = MessengerConfig::default();
    config.engine.escalate_on_faq_miss = true;
    let harness = TestHarness::builder().with_config(config).build().await.unwrap();
    let id = harness.start("web-1").await.unwrap().conversation_id;
    harness.reply(&id, "Dana").await.unwrap();
    harness.reply(&id, "0501234567").await.unwrap();

    let turn = harness.reply(&id, "qwxz").await.unwrap();
    assert_eq!(turn.outcome, TurnOutcome::Rejected);
    assert!(turn.needs_human);

    let conversation = harness.storage.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(conversation.needs_human_reason.as_deref(), Some("faq_miss"));

    harness.desk.resolve_human(&id).await.unwrap();
    let conversation = harness.storage.get_conversation(&id).await.unwrap().unwrap();
    assert!(!conversation.needs_human);
    assert!(conversation.needs_human_reason.is_none());
}

// ---- Delegated assistant ----

#[tokio::test]
async fn test_delegated_step_answers_with_provider_reply() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["We open at 9.".to_string()])
        .build()
        .await
        .unwrap();
    activate_assistant_workflow(&harness).await;

    let id = harness.start("web-1").await.unwrap().conversation_id;
    let turn = harness.reply(&id, "When do you open?").await.unwrap();
    assert_eq!(turn.outcome, TurnOutcome::Answered);
    assert_eq!(turn.message, "We open at 9.");
    assert_eq!(turn.next_step_ref.as_deref(), Some("ASK"));

    let requests = harness.mock_provider.requests().await;
    assert_eq!(requests.len(), 1);
    let last = requests[0].messages.last().unwrap();
    assert_eq!(last.role, MessageRole::User);
    assert_eq!(last.content, "When do you open?");
}

#[tokio::test]
async fn test_handoff_marker_flags_the_conversation() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["[[HANDOFF]] Let me find a colleague.".to_string()])
        .build()
        .await
        .unwrap();
    activate_assistant_workflow(&harness).await;

    let id = harness.start("web-1").await.unwrap().conversation_id;
    let turn = harness.reply(&id, "I want to talk to a person").await.unwrap();
    assert!(turn.needs_human);
    assert!(!turn.message.contains("[[HANDOFF]]"));

    let conversation = harness.storage.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(
        conversation.needs_human_reason.as_deref(),
        Some("assistant_handoff")
    );
}

// ---- Agent desk ----

#[tokio::test]
async fn test_agent_takeover_then_resume() {
    let harness = TestHarness::builder().build().await.unwrap();
    let id = harness.start("web-1").await.unwrap().conversation_id;

    let (conversation, _) = harness.desk.send(&id, "Hello, Noa here").await.unwrap();
    assert!(conversation.clara_paused);
    assert!(conversation.clara_paused_until.is_some());

    let paused = harness.reply(&id, "Dana").await.unwrap();
    assert_eq!(paused.outcome, TurnOutcome::Paused);
    let conversation = harness.storage.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(conversation.current_step_ref.as_deref(), Some("ASK_NAME"));

    harness.desk.set_paused(&id, false).await.unwrap();
    let resumed = harness.reply(&id, "Dana").await.unwrap();
    assert_eq!(resumed.outcome, TurnOutcome::Advanced);
    assert_eq!(resumed.next_step_ref.as_deref(), Some("ASK_PHONE"));
}

#[tokio::test]
async fn test_abandoned_conversation_rejects_replies() {
    let harness = TestHarness::builder().build().await.unwrap();
    let id = harness.start("web-1").await.unwrap().conversation_id;

    let abandoned = harness.desk.abandon(&id).await.unwrap();
    assert_eq!(abandoned.status, ConversationStatus::Abandoned);
    assert!(harness.desk.close(&id).await.is_err());
    assert!(harness.reply(&id, "Dana").await.is_err());

    // A new start for the same session opens a fresh conversation.
    let fresh = harness.start("web-1").await.unwrap();
    assert!(!fresh.resumed);
    assert_ne!(fresh.conversation_id, id);
}
