// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation state machine.
//!
//! Each call loads the conversation row, works on an in-memory copy and
//! writes the user message, any assistant reply and the new cursor in a
//! single [`StorageAdapter::commit_turn`]. The commit carries the version
//! read at load time, so two replies racing on one conversation cannot both
//! move the cursor.

use std::sync::Arc;

use chrono::Utc;
use messenger_config::model::EngineConfig;
use messenger_core::types::{
    CollectedData, Conversation, ConversationStatus, Locale, Message, Module, ModuleDefinition,
    ModuleType, NewConversation, NewMessage, ValidationFormat, WorkflowStep,
};
use messenger_core::{MessengerError, ProviderAdapter, StorageAdapter};
use messenger_faq::FaqRetriever;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::assistant::Assistant;
use crate::graph::{NextStep, WorkflowGraph};
use crate::overlay::{PauseState, clear_expired_pause, escalate, reasons};
use crate::render::{
    Confirmation, Interpretation, RenderedPrompt, Renderer, defaults, pending_key,
};
use crate::types::{StartRequest, StartResponse, TurnOutcome, TurnResponse, UserMessage};
use crate::validation::{ValidationRegistry, ValidationResult};

pub struct EngineBuilder {
    storage: Arc<dyn StorageAdapter>,
    config: EngineConfig,
    provider: Option<Arc<dyn ProviderAdapter>>,
    faq: Option<Arc<FaqRetriever>>,
    registry: Option<ValidationRegistry>,
}

impl EngineBuilder {
    pub fn provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn faq(mut self, faq: Arc<FaqRetriever>) -> Self {
        self.faq = Some(faq);
        self
    }

    /// Replaces the built-in validator set.
    pub fn registry(mut self, registry: ValidationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            graph: WorkflowGraph::new(self.storage.clone()),
            assistant: Assistant::new(self.provider, self.faq.clone(), &self.config),
            registry: self.registry.unwrap_or_default(),
            faq: self.faq,
            fallback_locale: self.config.fallback_locale(),
            escalate_on_faq_miss: self.config.escalate_on_faq_miss,
            storage: self.storage,
        }
    }
}

/// Drives conversations through the active workflow.
pub struct Engine {
    storage: Arc<dyn StorageAdapter>,
    graph: WorkflowGraph,
    registry: ValidationRegistry,
    assistant: Assistant,
    faq: Option<Arc<FaqRetriever>>,
    fallback_locale: Locale,
    escalate_on_faq_miss: bool,
}

/// What a turn writes and answers, before it is committed.
struct Turn {
    messages: Vec<NewMessage>,
    outcome: TurnOutcome,
    reply: String,
    prompt: Option<RenderedPrompt>,
}

impl Engine {
    pub fn builder(storage: Arc<dyn StorageAdapter>, config: &EngineConfig) -> EngineBuilder {
        EngineBuilder {
            storage,
            config: config.clone(),
            provider: None,
            faq: None,
            registry: None,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn fallback_locale(&self) -> Locale {
        self.fallback_locale
    }

    pub fn registry(&self) -> &ValidationRegistry {
        &self.registry
    }

    fn renderer<'a>(&self, conversation: &'a Conversation) -> Renderer<'a> {
        Renderer::new(
            conversation.locale,
            self.fallback_locale,
            &conversation.collected_data,
        )
    }

    /// Opens a conversation on the entry step of the active workflow, or
    /// resumes the session's active conversation.
    pub async fn start_conversation(
        &self,
        request: &StartRequest,
    ) -> Result<StartResponse, MessengerError> {
        self.start_inner(request)
            .await
            .inspect_err(|e| log_failure(e, "start conversation", &request.session_id))
    }

    async fn start_inner(&self, request: &StartRequest) -> Result<StartResponse, MessengerError> {
        let session_id = request.session_id.trim();
        if session_id.is_empty() {
            return Err(MessengerError::InvalidInput("sessionId is required".into()));
        }
        let settings = self.storage.get_settings().await?;
        if !settings.is_active {
            return Err(MessengerError::Unavailable("messenger is disabled".into()));
        }

        if let Some(conversation) = self.storage.find_active_conversation(session_id).await? {
            return self.resume(conversation).await;
        }

        let locale = request
            .locale
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map_or(self.fallback_locale, Locale::normalize);

        let workflow = self.graph.active_workflow().await?;
        let entry = self.graph.entry_step(&workflow.id).await?;
        let (module, _) = self.resolve_module(&entry).await?;
        let empty = CollectedData::new();
        let prompt = Renderer::new(locale, self.fallback_locale, &empty).render(&module);

        let conversation = self
            .storage
            .create_conversation(
                &NewConversation {
                    session_id: session_id.to_string(),
                    branch_id: non_blank(request.branch_id.as_deref()),
                    contact_id: non_blank(request.contact_id.as_deref()),
                    workflow_id: workflow.id.clone(),
                    entry_step_ref: entry.step_ref.clone(),
                    locale,
                },
                &NewMessage::assistant(prompt.text.clone(), Some(entry.step_ref.clone())),
            )
            .await?;
        info!(
            conversation_id = %conversation.id,
            workflow_id = %workflow.id,
            step_ref = %entry.step_ref,
            locale = %locale.as_str(),
            "conversation started"
        );

        Ok(StartResponse {
            conversation_id: conversation.id,
            first_message: prompt.text,
            locale,
            module_type: prompt.module_type,
            choices: prompt.choices,
            step_ref: entry.step_ref,
            resumed: false,
        })
    }

    async fn resume(&self, conversation: Conversation) -> Result<StartResponse, MessengerError> {
        let step_ref = current_step(&conversation)?;
        let step = self.graph.step(&conversation.workflow_id, &step_ref).await?;
        let (module, _) = self.resolve_module(&step).await?;
        let prompt = self.renderer(&conversation).render(&module);
        debug!(conversation_id = %conversation.id, step_ref = %step_ref, "conversation resumed");
        Ok(StartResponse {
            conversation_id: conversation.id,
            first_message: prompt.text,
            locale: conversation.locale,
            module_type: prompt.module_type,
            choices: prompt.choices,
            step_ref,
            resumed: true,
        })
    }

    /// Applies one user reply to a conversation.
    pub async fn process_user_message(
        &self,
        message: &UserMessage,
    ) -> Result<TurnResponse, MessengerError> {
        self.process_inner(message)
            .await
            .inspect_err(|e| log_failure(e, "process message", &message.conversation_id))
    }

    async fn process_inner(&self, message: &UserMessage) -> Result<TurnResponse, MessengerError> {
        let now = Utc::now();
        let mut conversation = self
            .storage
            .get_conversation(&message.conversation_id)
            .await?
            .ok_or_else(|| MessengerError::not_found("conversation", &message.conversation_id))?;
        if conversation.status.is_terminal() {
            return Err(MessengerError::ConversationClosed {
                conversation_id: conversation.id,
                status: conversation.status,
            });
        }
        if clear_expired_pause(&mut conversation, now) {
            debug!(conversation_id = %conversation.id, "pause window elapsed, resuming");
        }

        let step_ref = current_step(&conversation)?;
        let text = message.message.trim();
        let choice_id = message
            .choice_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let content = if text.is_empty() {
            choice_id.unwrap_or_default()
        } else {
            text
        };
        let mut user = NewMessage::user(content, Some(step_ref.clone()));
        if let Some(id) = choice_id {
            user = user.with_metadata(json!({ "choice_id": id }));
        }

        if PauseState::of(&conversation, now).is_paused() {
            debug!(conversation_id = %conversation.id, "AI paused, recording reply only");
            let stored = self.commit(conversation, vec![user]).await?;
            return Ok(TurnResponse {
                success: true,
                message: String::new(),
                outcome: TurnOutcome::Paused,
                next_step_ref: None,
                conversation_status: stored.status,
                module_type: None,
                choices: None,
                needs_human: stored.needs_human,
            });
        }

        let turn = match self
            .compute_turn(&mut conversation, &step_ref, text, choice_id, user.clone())
            .await
        {
            Ok(turn) => turn,
            Err(e) => {
                self.record_reply(&conversation.id, &user).await;
                return Err(e);
            }
        };

        let outcome = turn.outcome;
        let stored = self.commit(conversation, turn.messages).await?;
        info!(
            conversation_id = %stored.id,
            step_ref = ?stored.current_step_ref,
            outcome = ?outcome,
            "turn processed"
        );

        let (module_type, choices) = match turn.prompt {
            Some(prompt) => (Some(prompt.module_type), prompt.choices),
            None => (None, None),
        };
        Ok(TurnResponse {
            success: true,
            message: turn.reply,
            outcome,
            next_step_ref: match outcome {
                TurnOutcome::Completed => None,
                _ => stored.current_step_ref.clone(),
            },
            conversation_status: stored.status,
            module_type,
            choices,
            needs_human: stored.needs_human,
        })
    }

    /// Interprets the reply against the current step and builds the turn to
    /// commit. Nothing is written here.
    async fn compute_turn(
        &self,
        conversation: &mut Conversation,
        step_ref: &str,
        text: &str,
        choice_id: Option<&str>,
        user: NewMessage,
    ) -> Result<Turn, MessengerError> {
        let step = self.graph.step(&conversation.workflow_id, step_ref).await?;
        let (module, format) = self.resolve_module(&step).await?;
        if let Some(value) = conversation.collected_data.get(&pending_key(step_ref)).cloned() {
            return self
                .settle_pending(conversation, &step, &module, value, text, choice_id, user)
                .await;
        }
        let interpretation = self.renderer(conversation).interpret(
            &module,
            text,
            choice_id,
            &self.registry,
            format.as_ref(),
        )?;

        Ok(match interpretation {
            Interpretation::Accepted {
                value,
                next_step_ref,
            } => {
                conversation
                    .collected_data
                    .insert(step.step_ref.clone(), value);
                let next = self
                    .graph
                    .resolve_next(&step, next_step_ref.as_deref())
                    .await?;
                self.advance(conversation, &module, next, user).await?
            }
            Interpretation::Rejected { error } => {
                self.reprompt(conversation, &module, step_ref, &error, user)
            }
            Interpretation::NoChoiceMatch { error } => {
                self.faq_fallback(conversation, &module, step_ref, text, &error, user)
                    .await
            }
            Interpretation::Confirm { value } => {
                conversation
                    .collected_data
                    .insert(pending_key(step_ref), value.clone());
                self.ask_confirmation(conversation, step_ref, &value, None, user)
            }
            Interpretation::Delegated if text.is_empty() => {
                let error = self.renderer(conversation).text(&defaults::empty_reply());
                self.reprompt(conversation, &module, step_ref, &error, user)
            }
            Interpretation::Delegated => {
                self.delegate(conversation, &module, step_ref, text, user)
                    .await?
            }
        })
    }

    /// Resolves a yes/no reply to a value read back on the previous turn.
    #[allow(clippy::too_many_arguments)]
    async fn settle_pending(
        &self,
        conversation: &mut Conversation,
        step: &WorkflowStep,
        module: &Module,
        value: String,
        text: &str,
        choice_id: Option<&str>,
        user: NewMessage,
    ) -> Result<Turn, MessengerError> {
        let key = pending_key(&step.step_ref);
        match Confirmation::of(text, choice_id) {
            Confirmation::Yes => {
                conversation.collected_data.remove(&key);
                conversation
                    .collected_data
                    .insert(step.step_ref.clone(), value);
                let next = self.graph.resolve_next(step, None).await?;
                self.advance(conversation, module, next, user).await
            }
            Confirmation::No => {
                conversation.collected_data.remove(&key);
                let retry = self.renderer(conversation).text(&defaults::enter_again());
                Ok(self.reprompt(conversation, module, &step.step_ref, &retry, user))
            }
            Confirmation::Unclear => {
                let error = self.renderer(conversation).text(&defaults::answer_yes_or_no());
                Ok(self.ask_confirmation(
                    conversation,
                    &step.step_ref,
                    &value,
                    Some(error.as_str()),
                    user,
                ))
            }
        }
    }

    /// Reads `value` back with Yes and No choices; the step does not move.
    fn ask_confirmation(
        &self,
        conversation: &Conversation,
        step_ref: &str,
        value: &str,
        error: Option<&str>,
        user: NewMessage,
    ) -> Turn {
        let mut prompt = self.renderer(conversation).confirmation(value);
        let mut metadata = json!({ "pending": value });
        if let Some(error) = error {
            prompt = prompt.prefixed(error);
            metadata["validation_error"] = json!(error);
        }
        let assistant = NewMessage::assistant(prompt.text.clone(), Some(step_ref.to_string()))
            .with_metadata(metadata);
        Turn {
            messages: vec![user, assistant],
            outcome: TurnOutcome::Confirming,
            reply: prompt.text.clone(),
            prompt: Some(prompt),
        }
    }

    /// Moves past an accepted step, or completes the conversation.
    async fn advance(
        &self,
        conversation: &mut Conversation,
        module: &Module,
        next: NextStep,
        user: NewMessage,
    ) -> Result<Turn, MessengerError> {
        let success = module
            .success_message
            .as_ref()
            .filter(|text| !text.is_empty())
            .map(|text| self.renderer(conversation).text(text));

        match next {
            NextStep::Step(next) => {
                let (next_module, _) = self.resolve_module(&next).await?;
                let mut prompt = self.renderer(conversation).render(&next_module);
                if let Some(success) = &success {
                    prompt = prompt.prefixed(success);
                }
                conversation.current_step_ref = Some(next.step_ref.clone());
                Ok(Turn {
                    messages: vec![
                        user,
                        NewMessage::assistant(prompt.text.clone(), Some(next.step_ref)),
                    ],
                    outcome: TurnOutcome::Advanced,
                    reply: prompt.text.clone(),
                    prompt: Some(prompt),
                })
            }
            NextStep::Terminal => {
                conversation.status = ConversationStatus::Completed;
                conversation.completed_at = Some(Utc::now());
                let step_ref = conversation.current_step_ref.clone();
                let mut messages = vec![user];
                if let Some(success) = &success {
                    messages.push(NewMessage::assistant(success.clone(), step_ref));
                }
                Ok(Turn {
                    messages,
                    outcome: TurnOutcome::Completed,
                    reply: success.unwrap_or_default(),
                    prompt: None,
                })
            }
        }
    }

    fn reprompt(
        &self,
        conversation: &Conversation,
        module: &Module,
        step_ref: &str,
        error: &str,
        user: NewMessage,
    ) -> Turn {
        let prompt = self.renderer(conversation).render(module).prefixed(error);
        let assistant = NewMessage::assistant(prompt.text.clone(), Some(step_ref.to_string()))
            .with_metadata(json!({ "validation_error": error }));
        Turn {
            messages: vec![user, assistant],
            outcome: TurnOutcome::Rejected,
            reply: prompt.text.clone(),
            prompt: Some(prompt),
        }
    }

    /// Answers a reply that matched no choice from the FAQ, re-prompting the
    /// step either way.
    async fn faq_fallback(
        &self,
        conversation: &mut Conversation,
        module: &Module,
        step_ref: &str,
        text: &str,
        error: &str,
        user: NewMessage,
    ) -> Turn {
        let Some((faq_id, answer)) = self.faq_answer(conversation, text).await else {
            if self.escalate_on_faq_miss {
                escalate(conversation, reasons::FAQ_MISS);
            }
            return self.reprompt(conversation, module, step_ref, error, user);
        };
        let prompt = self.renderer(conversation).render(module).prefixed(&answer);
        let assistant = NewMessage::assistant(prompt.text.clone(), Some(step_ref.to_string()))
            .with_metadata(json!({ "faq_id": faq_id }));
        Turn {
            messages: vec![user, assistant],
            outcome: TurnOutcome::Answered,
            reply: prompt.text.clone(),
            prompt: Some(prompt),
        }
    }

    async fn faq_answer(&self, conversation: &Conversation, text: &str) -> Option<(String, String)> {
        let faq = self.faq.as_ref()?;
        let matches = match faq
            .search(text, conversation.locale, self.fallback_locale)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "FAQ lookup failed");
                return None;
            }
        };
        let best = matches.into_iter().find(|m| m.score > 0.0)?;
        let (_, answer) = best.localized(conversation.locale, self.fallback_locale);
        let answer = answer.trim();
        if answer.is_empty() {
            return None;
        }
        Some((best.entry.id.clone(), answer.to_string()))
    }

    /// Hands the reply to the assistant. The step never advances here.
    async fn delegate(
        &self,
        conversation: &mut Conversation,
        module: &Module,
        step_ref: &str,
        text: &str,
        user: NewMessage,
    ) -> Result<Turn, MessengerError> {
        let llm_config = module.definition.llm_config().cloned().unwrap_or_default();
        let history = self.storage.list_messages(&conversation.id).await?;
        let module_prompt = self.renderer(conversation).text(&module.content);
        let reply = self
            .assistant
            .respond(
                conversation,
                &llm_config,
                &module_prompt,
                &history,
                text,
                self.fallback_locale,
            )
            .await;
        if let Some(reason) = reply.escalation {
            warn!(conversation_id = %conversation.id, reason, "conversation needs a human");
            escalate(conversation, reason);
        }
        let assistant = NewMessage::assistant(reply.text.clone(), Some(step_ref.to_string()))
            .with_metadata(json!({ "source": "assistant" }));
        Ok(Turn {
            messages: vec![user, assistant],
            outcome: TurnOutcome::Answered,
            reply: reply.text,
            prompt: Some(RenderedPrompt {
                text: String::new(),
                module_type: ModuleType::LlmDelegated,
                choices: None,
            }),
        })
    }

    /// The module of `step` with its validation format, both checked.
    async fn resolve_module(
        &self,
        step: &WorkflowStep,
    ) -> Result<(Module, Option<ValidationFormat>), MessengerError> {
        let module = self.graph.module(step).await?;
        let format = self.graph.format_for(&module).await?;
        if let Some(format) = &format {
            self.registry.check(format)?;
        }
        if let ModuleDefinition::Choice { choices } = &module.definition {
            if choices.is_empty() {
                return Err(MessengerError::workflow(format!(
                    "choice module `{}` declares no choices",
                    module.ref_code
                )));
            }
        }
        Ok((module, format))
    }

    /// Commits a turn. On a version conflict the user message is still
    /// appended so the transcript keeps the reply.
    async fn commit(
        &self,
        conversation: Conversation,
        messages: Vec<NewMessage>,
    ) -> Result<Conversation, MessengerError> {
        match self.storage.commit_turn(&conversation, &messages).await {
            Err(e) => {
                if matches!(e, MessengerError::Conflict { .. }) {
                    warn!(conversation_id = %conversation.id, "concurrent reply, turn discarded");
                }
                if let Some(user) = messages.first() {
                    self.record_reply(&conversation.id, user).await;
                }
                Err(e)
            }
            stored => stored,
        }
    }

    /// Appends the user's reply on its own after the turn could not be
    /// committed, so the transcript keeps every turn.
    async fn record_reply(&self, conversation_id: &str, user: &NewMessage) {
        if let Err(e) = self.storage.append_message(conversation_id, user).await {
            warn!(conversation_id, error = %e, "could not record the user reply");
        }
    }

    /// Transcript of a conversation in append order.
    pub async fn history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, MessengerError> {
        if self.storage.get_conversation(conversation_id).await?.is_none() {
            return Err(MessengerError::not_found("conversation", conversation_id));
        }
        self.storage.list_messages(conversation_id).await
    }

    /// Validates `raw` against the active format `format_code`.
    pub async fn validate(
        &self,
        format_code: &str,
        raw: &str,
    ) -> Result<ValidationResult, MessengerError> {
        let format = self
            .storage
            .get_validation_format(format_code)
            .await?
            .filter(|format| format.is_active)
            .ok_or_else(|| {
                MessengerError::workflow(format!("unknown validation format `{format_code}`"))
            })?;
        self.registry.validate(&format, raw, None)
    }
}

fn current_step(conversation: &Conversation) -> Result<String, MessengerError> {
    conversation.current_step_ref.clone().ok_or_else(|| {
        MessengerError::workflow(format!(
            "conversation {} has no current step",
            conversation.id
        ))
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn log_failure(error: &MessengerError, action: &str, subject: &str) {
    match error {
        MessengerError::WorkflowConfig(detail) => {
            error!(subject, detail = %detail, "{action}: workflow misconfigured");
        }
        MessengerError::Storage { .. } | MessengerError::Internal(_) => {
            error!(subject, error = %error, "{action} failed");
        }
        _ => debug!(subject, error = %error, "{action} refused"),
    }
}
