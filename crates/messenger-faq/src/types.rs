// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FAQ lookup result types and vector math.

use messenger_core::types::{FaqEntry, Locale};
use serde::Serialize;

/// How a FAQ match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Semantic,
    Keyword,
}

/// A FAQ entry scored against a query.
#[derive(Debug, Clone)]
pub struct FaqMatch {
    pub entry: FaqEntry,
    /// Cosine similarity for semantic matches, matched keyword count otherwise.
    pub score: f32,
    pub source: MatchSource,
}

impl FaqMatch {
    /// Question and answer in `locale`, falling back across translations.
    pub fn localized(&self, locale: Locale, fallback: Locale) -> (&str, &str) {
        (
            self.entry.question.resolve(locale, fallback),
            self.entry.answer.resolve(locale, fallback),
        )
    }
}

/// Outcome of a bulk embedding resync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub total: usize,
}

/// Cosine similarity of two vectors.
///
/// Vectors of different length, or with a zero norm, score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Render matches as a prompt block of `Q:`/`A:` pairs.
pub fn format_faq_block(matches: &[FaqMatch], locale: Locale, fallback: Locale) -> String {
    if matches.is_empty() {
        return "No FAQ available.".to_string();
    }
    matches
        .iter()
        .map(|m| {
            let (question, answer) = m.localized(locale, fallback);
            format!("Q: {question}\nA: {answer}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
