// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword scoring used when semantic lookup is unavailable or finds nothing.
//!
//! The message is lowercased, punctuation is dropped, and French, English and
//! Hebrew stop words are removed. Each remaining keyword scores one point for
//! an entry whose localized question and answer contain it or share a word
//! with it (containment or a common prefix of three characters or more).

use messenger_core::types::{FaqEntry, Locale};

use crate::types::{FaqMatch, MatchSource};

const STOP_WORDS: &[&str] = &[
    // he
    "של", "את", "על", "עם", "זה", "הוא", "היא", "אני", "לא", "כן", "מה", "איך", "למה", "מי",
    "יש", "אין", "גם", "רק", "או", "אם", "כי", "אז", "פה", "שם", "הם", "לי", "לך", "לו", "לה",
    "אנחנו", "שלי", "שלך", "שלו", "שלה", "אפשר", "צריך", "רוצה", "היי", "שלום", "בוקר", "ערב",
    // fr
    "le", "la", "les", "de", "du", "des", "un", "une", "et", "ou", "je", "tu", "il", "elle", "on",
    "nous", "vous", "ils", "est", "sont", "pour", "pas", "que", "qui", "dans", "avec", "sur",
    "par", "ne", "ce", "se", "en", "au", "aux", "mais", "donc", "car",
    // en
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "do", "does", "did", "have",
    "has", "had", "will", "would", "can", "could", "should", "may", "might", "i", "you", "he",
    "she", "it", "we", "they", "my", "your", "his", "her", "its", "our", "their", "this", "that",
    "what", "how", "when", "where", "who", "which", "to", "of", "in", "for", "on", "at", "by",
    "with", "from", "and", "or", "but", "not", "no", "yes",
];

/// Entries returned unscored when a message has no usable keyword.
const UNSCORED_LIMIT: usize = 5;

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '?' | '!' | '.' | ',' | ';' | ':' | '"' | '\'' | '(' | ')' | '-' | '–' | '—' | '“'
                | '”' | '‘' | '’'
        )
}

/// Lowercased keywords of at least two characters, stop words removed.
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(is_separator)
        .filter(|w| w.chars().count() >= 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Whether `keyword` occurs in the lowercased `text`, directly or fuzzily.
pub fn keyword_matches(keyword: &str, text: &str) -> bool {
    if text.contains(keyword) {
        return true;
    }
    if keyword.chars().count() < 3 {
        return false;
    }
    text.split(is_separator)
        .filter(|word| word.chars().count() >= 3)
        .any(|word| {
            word.contains(keyword) || keyword.contains(word) || common_prefix_len(word, keyword) >= 3
        })
}

/// Score `entries` against `message` and keep the best `limit` with a score of
/// at least one. Ties keep the input order.
pub fn score_entries(
    entries: &[FaqEntry],
    message: &str,
    locale: Locale,
    fallback: Locale,
    limit: usize,
) -> Vec<FaqMatch> {
    let keywords = extract_keywords(message);
    if keywords.is_empty() {
        return entries
            .iter()
            .take(limit.min(UNSCORED_LIMIT))
            .map(|entry| FaqMatch {
                entry: entry.clone(),
                score: 0.0,
                source: MatchSource::Keyword,
            })
            .collect();
    }

    let mut scored: Vec<FaqMatch> = entries
        .iter()
        .filter_map(|entry| {
            let text = format!(
                "{} {}",
                entry.question.resolve(locale, fallback),
                entry.answer.resolve(locale, fallback)
            )
            .to_lowercase();
            let score = keywords.iter().filter(|kw| keyword_matches(kw, &text)).count();
            (score > 0).then(|| FaqMatch {
                entry: entry.clone(),
                score: score as f32,
                source: MatchSource::Keyword,
            })
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}
