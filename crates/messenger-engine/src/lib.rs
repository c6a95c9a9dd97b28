// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step-based conversation engine.
//!
//! A conversation walks the steps of the active workflow. Each step renders
//! a module (free text, choice, validated field or delegated assistant) and
//! interprets the reply; accepted replies are collected under the step ref
//! and move the cursor, rejected ones re-prompt the same step.

pub mod assistant;
pub mod datetime;
pub mod desk;
pub mod graph;
pub mod machine;
pub mod overlay;
pub mod render;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use assistant::{Assistant, AssistantReply};
pub use datetime::{Parsed, parse_date, parse_time};
pub use desk::AgentDesk;
pub use graph::{NextStep, WorkflowGraph};
pub use machine::{Engine, EngineBuilder};
pub use render::{Interpretation, RenderedChoice, RenderedPrompt, Renderer};
pub use types::{
    ConversationDetail, StartRequest, StartResponse, TurnOutcome, TurnResponse, UserMessage,
};
pub use validation::{ValidationRegistry, ValidationResult};
