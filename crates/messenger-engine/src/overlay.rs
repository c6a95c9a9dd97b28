// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI-pause and needs-human policy layered over normal stepping.
//!
//! Pause state is derived from the stored flag and `clara_paused_until` at
//! every read: a window that has elapsed counts as resumed even before the
//! row is rewritten.

use chrono::{DateTime, Duration, Utc};
use messenger_core::types::{Conversation, MessengerSettings};

/// Needs-human reasons set by the engine.
pub mod reasons {
    pub const ASSISTANT_HANDOFF: &str = "assistant_handoff";
    pub const ASSISTANT_EMPTY_RESPONSE: &str = "assistant_empty_response";
    pub const ASSISTANT_ERROR: &str = "assistant_error";
    pub const ASSISTANT_UNAVAILABLE: &str = "assistant_unavailable";
    pub const FAQ_MISS: &str = "faq_miss";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Running,
    /// Paused until resumed by hand.
    Manual,
    /// Paused until the given instant.
    Until(DateTime<Utc>),
    /// The window has elapsed but the row still carries the flag.
    Expired,
}

impl PauseState {
    pub fn of(conversation: &Conversation, now: DateTime<Utc>) -> Self {
        match (conversation.clara_paused, conversation.clara_paused_until) {
            (false, _) => PauseState::Running,
            (true, None) => PauseState::Manual,
            (true, Some(until)) if until > now => PauseState::Until(until),
            (true, Some(_)) => PauseState::Expired,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PauseState::Manual | PauseState::Until(_))
    }
}

/// Clears an elapsed pause in memory so the next commit writes it back.
/// Returns true when something changed.
pub fn clear_expired_pause(conversation: &mut Conversation, now: DateTime<Utc>) -> bool {
    if PauseState::of(conversation, now) == PauseState::Expired {
        conversation.clara_paused = false;
        conversation.clara_paused_until = None;
        true
    } else {
        false
    }
}

/// Length of an agent takeover window.
///
/// A zero value in the settings row falls back to the configured minutes.
pub fn pause_window(settings: &MessengerSettings, fallback_minutes: u32) -> Duration {
    let minutes = match settings.auto_resume_minutes {
        0 => fallback_minutes.max(1),
        minutes => minutes,
    };
    Duration::minutes(i64::from(minutes))
}

/// Raises the needs-human flag, keeping the first reason while it is unresolved.
pub fn escalate(conversation: &mut Conversation, reason: &str) {
    if !conversation.needs_human {
        conversation.needs_human = true;
        conversation.needs_human_reason = Some(reason.to_string());
    }
}
