// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Free-form dates and times typed by visitors.
//!
//! Dates normalize to `YYYY-MM-DD`, times to 24h `HH:MM`. A parse is marked
//! `ambiguous` when the engine should read it back before storing it: a
//! date without a year, or an hour that could be morning or afternoon.

use chrono::{Datelike, Days, NaiveDate};
use messenger_core::types::Locale;

/// A normalized value and whether it needs confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub value: String,
    pub ambiguous: bool,
}

impl Parsed {
    fn exact(value: String) -> Self {
        Self {
            value,
            ambiguous: false,
        }
    }

    fn guessed(value: String) -> Self {
        Self {
            value,
            ambiguous: true,
        }
    }
}

impl From<String> for Parsed {
    fn from(value: String) -> Self {
        Self::exact(value)
    }
}

const YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

const MONTHS_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre",
    "octobre", "novembre", "décembre",
];

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Month words in fr, en and he, with common abbreviations and unaccented
/// spellings.
const MONTH_WORDS: &[(&str, u32)] = &[
    ("janvier", 1), ("janv", 1), ("january", 1), ("jan", 1), ("ינואר", 1),
    ("février", 2), ("fevrier", 2), ("févr", 2), ("fevr", 2), ("fév", 2), ("fev", 2),
    ("february", 2), ("feb", 2), ("פברואר", 2),
    ("mars", 3), ("march", 3), ("mar", 3), ("מרץ", 3), ("מרס", 3),
    ("avril", 4), ("avr", 4), ("april", 4), ("apr", 4), ("אפריל", 4),
    ("mai", 5), ("may", 5), ("מאי", 5),
    ("juin", 6), ("june", 6), ("jun", 6), ("יוני", 6),
    ("juillet", 7), ("juil", 7), ("july", 7), ("jul", 7), ("יולי", 7),
    ("août", 8), ("aout", 8), ("aoû", 8), ("aou", 8), ("august", 8), ("aug", 8), ("אוגוסט", 8),
    ("septembre", 9), ("september", 9), ("sept", 9), ("sep", 9), ("ספטמבר", 9),
    ("octobre", 10), ("october", 10), ("oct", 10), ("אוקטובר", 10),
    ("novembre", 11), ("november", 11), ("nov", 11), ("נובמבר", 11),
    ("décembre", 12), ("decembre", 12), ("december", 12), ("déc", 12), ("dec", 12),
    ("דצמבר", 12),
];

/// Relative day words, longest first so "après-demain" wins over "demain".
const RELATIVE_DAYS: &[(&str, u64)] = &[
    ("day after tomorrow", 2),
    ("après-demain", 2),
    ("apres-demain", 2),
    ("après demain", 2),
    ("apres demain", 2),
    ("מחרתיים", 2),
    ("aujourd'hui", 0),
    ("aujourdhui", 0),
    ("today", 0),
    ("היום", 0),
    ("tomorrow", 1),
    ("demain", 1),
    ("מחר", 1),
];

fn month_number(word: &str) -> Option<u32> {
    let word = word.trim_end_matches(['.', ',']);
    let lookup = |w: &str| {
        MONTH_WORDS
            .iter()
            .find(|(name, _)| *name == w)
            .map(|(_, month)| *month)
    };
    // Hebrew attaches "in" to the month: "במרץ".
    lookup(word).or_else(|| word.strip_prefix('ב').and_then(lookup))
}

fn digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !YEARS.contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a date relative to `today`.
///
/// Accepts ISO dates, `DD/MM/YYYY` with `/`, `-` or `.`, `DD/MM`,
/// compact `DDMM` and `DDMMYYYY`, a day with a month word ("5 février",
/// "February 5, 2026", "5 במרץ") and relative words ("demain", "today").
pub fn parse_date(input: &str, today: NaiveDate) -> Option<Parsed> {
    let cleaned = input
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(parsed) = NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d") {
        return YEARS
            .contains(&parsed.year())
            .then(|| Parsed::exact(iso(parsed)));
    }

    let parts: Vec<&str> = cleaned.split(['/', '-', '.']).collect();
    if parts.len() >= 2 && parts.iter().all(|p| digits(p)) {
        return numeric_date(&parts, today);
    }

    if digits(&cleaned) {
        return match cleaned.len() {
            4 => date(today.year(), cleaned[2..4].parse().ok()?, cleaned[..2].parse().ok()?)
                .map(|d| Parsed::guessed(iso(d))),
            8 => date(
                cleaned[4..].parse().ok()?,
                cleaned[2..4].parse().ok()?,
                cleaned[..2].parse().ok()?,
            )
            .map(|d| Parsed::exact(iso(d))),
            _ => None,
        };
    }

    if let Some(parsed) = worded_date(&cleaned, today) {
        return Some(parsed);
    }

    RELATIVE_DAYS
        .iter()
        .find(|(word, _)| cleaned.contains(word))
        .and_then(|(_, offset)| today.checked_add_days(Days::new(*offset)))
        .map(|d| Parsed::exact(iso(d)))
}

fn numeric_date(parts: &[&str], today: NaiveDate) -> Option<Parsed> {
    if parts[..2].iter().any(|p| p.len() > 2) {
        return None;
    }
    let day = parts[0].parse().ok()?;
    let month = parts[1].parse().ok()?;
    match parts {
        [_, _] => date(today.year(), month, day).map(|d| Parsed::guessed(iso(d))),
        [_, _, year] if year.len() == 4 => {
            date(year.parse().ok()?, month, day).map(|d| Parsed::exact(iso(d)))
        }
        _ => None,
    }
}

/// "5 février 2026", "5 fév", "february 5, 2026", "5 במרץ".
fn worded_date(cleaned: &str, today: NaiveDate) -> Option<Parsed> {
    let tokens: Vec<&str> = cleaned
        .split([' ', ','])
        .filter(|t| !t.is_empty())
        .collect();
    let (at, month) = tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| month_number(t).map(|m| (i, m)))?;

    let day_at = |i: usize| {
        tokens
            .get(i)
            .map(|t| t.trim_end_matches(['.', ',']))
            .filter(|t| digits(t) && t.len() <= 2)
    };
    let (day, after) = match at.checked_sub(1).and_then(day_at) {
        Some(day) => (day, at + 1),
        None => (day_at(at + 1)?, at + 2),
    };
    let day: u32 = day.parse().ok()?;

    match tokens.get(after).filter(|t| digits(t) && t.len() == 4) {
        Some(year) => date(year.parse().ok()?, month, day).map(|d| Parsed::exact(iso(d))),
        None => date(today.year(), month, day).map(|d| Parsed::guessed(iso(d))),
    }
}

/// Parses a time of day.
///
/// Accepts `14:30`, `9:05`, `14h30`, `2h`, compact `1430`, a bare hour and
/// `am`/`pm` suffixes. `14 h` reads like `14h`.
pub fn parse_time(input: &str) -> Option<Parsed> {
    let compact: String = input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }

    let clock = |h: u32, m: u32| (h < 24 && m < 60).then(|| format!("{h:02}:{m:02}"));
    let minutes = |m: &str| -> Option<u32> {
        if m.is_empty() {
            Some(0)
        } else if digits(m) && m.len() == 2 {
            m.parse().ok()
        } else {
            None
        }
    };
    let hour = |h: &str| -> Option<u32> {
        (digits(h) && h.len() <= 2).then(|| h.parse().ok()).flatten()
    };

    for (suffix, afternoon) in [("am", false), ("pm", true)] {
        if let Some(rest) = compact.strip_suffix(suffix) {
            let (h, m) = rest.split_once(':').unwrap_or((rest, ""));
            let h = hour(h).filter(|h| (1..=12).contains(h))?;
            let h = match (h, afternoon) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            return clock(h, minutes(m)?).map(Parsed::exact);
        }
    }

    if let Some((h, m)) = compact.split_once(':') {
        if m.is_empty() {
            return None;
        }
        return clock(hour(h)?, minutes(m)?).map(Parsed::exact);
    }

    if let Some((h, m)) = compact.split_once('h') {
        let h = hour(h)?;
        let value = clock(h, minutes(m)?)?;
        return Some(if (1..=12).contains(&h) {
            Parsed::guessed(value)
        } else {
            Parsed::exact(value)
        });
    }

    if digits(&compact) && compact.len() == 4 {
        return clock(compact[..2].parse().ok()?, compact[2..].parse().ok()?).map(Parsed::exact);
    }

    clock(hour(&compact)?, 0).map(Parsed::guessed)
}

/// `YYYY-MM-DD` as a reader in `locale` writes it; anything else unchanged.
pub fn display_date(value: &str, locale: Locale) -> String {
    let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") else {
        return value.to_string();
    };
    let month = parsed.month0() as usize;
    match locale {
        Locale::Fr => format!("{} {} {}", parsed.day(), MONTHS_FR[month], parsed.year()),
        Locale::En => format!("{} {}, {}", MONTHS_EN[month], parsed.day(), parsed.year()),
        Locale::He => parsed.format("%d/%m/%Y").to_string(),
    }
}

/// 24h `HH:MM` as a reader in `locale` writes it; anything else unchanged.
pub fn display_time(value: &str, locale: Locale) -> String {
    let Some((h, m)) = value.split_once(':') else {
        return value.to_string();
    };
    let (Ok(hour), true) = (h.parse::<u32>(), digits(m) && m.len() == 2 && h.len() == 2) else {
        return value.to_string();
    };
    match locale {
        Locale::Fr if m == "00" => format!("{hour}h"),
        Locale::Fr => format!("{hour}h{m}"),
        Locale::En => {
            let period = if hour >= 12 { "PM" } else { "AM" };
            let shown = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{shown}:{m} {period}")
        }
        Locale::He => value.to_string(),
    }
}

/// A collected value shown back to the visitor: dates and times are
/// localized, other values pass through.
pub fn display_value(value: &str, locale: Locale) -> String {
    let bytes = value.as_bytes();
    match bytes.len() {
        10 if bytes[4] == b'-' && bytes[7] == b'-' => display_date(value, locale),
        5 if bytes[2] == b':' => display_time(value, locale),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn date(input: &str) -> Option<(String, bool)> {
        parse_date(input, today()).map(|p| (p.value, p.ambiguous))
    }

    fn time(input: &str) -> Option<(String, bool)> {
        parse_time(input).map(|p| (p.value, p.ambiguous))
    }

    fn exact(value: &str) -> Option<(String, bool)> {
        Some((value.to_string(), false))
    }

    fn guessed(value: &str) -> Option<(String, bool)> {
        Some((value.to_string(), true))
    }

    #[test]
    fn numeric_dates() {
        assert_eq!(date("2026-03-09"), exact("2026-03-09"));
        assert_eq!(date("09/03/2026"), exact("2026-03-09"));
        assert_eq!(date("9.3.2026"), exact("2026-03-09"));
        assert_eq!(date("12/04"), guessed("2026-04-12"));
        assert_eq!(date("1204"), guessed("2026-04-12"));
        assert_eq!(date("12042027"), exact("2027-04-12"));
        assert_eq!(date("31/02/2026"), None);
        assert_eq!(date("09/03/26"), None);
        assert_eq!(date("2026-13-01"), None);
    }

    #[test]
    fn month_words_in_each_language() {
        assert_eq!(date("5 février"), guessed("2026-02-05"));
        assert_eq!(date("5 fevrier 2027"), exact("2027-02-05"));
        assert_eq!(date("5 fév. 2027"), exact("2027-02-05"));
        assert_eq!(date("February 5, 2027"), exact("2027-02-05"));
        assert_eq!(date("5 Aug"), guessed("2026-08-05"));
        assert_eq!(date("5 במרץ 2027"), exact("2027-03-05"));
        assert_eq!(date("20 אוגוסט"), guessed("2026-08-20"));
        assert_eq!(date("30 février"), None);
        assert_eq!(date("février"), None);
    }

    #[test]
    fn relative_days() {
        assert_eq!(date("aujourd'hui"), exact("2026-03-09"));
        assert_eq!(date("Tomorrow"), exact("2026-03-10"));
        assert_eq!(date("demain matin"), exact("2026-03-10"));
        assert_eq!(date("après-demain"), exact("2026-03-11"));
        assert_eq!(date("the day after tomorrow"), exact("2026-03-11"));
        assert_eq!(date("מחרתיים"), exact("2026-03-11"));
        assert_eq!(date("מחר"), exact("2026-03-10"));
        assert_eq!(date("next week"), None);
    }

    #[test]
    fn clock_times() {
        assert_eq!(time("14:30"), exact("14:30"));
        assert_eq!(time("9:05"), exact("09:05"));
        assert_eq!(time("1430"), exact("14:30"));
        assert_eq!(time("14h30"), exact("14:30"));
        assert_eq!(time("14 h"), exact("14:00"));
        assert_eq!(time("2h"), guessed("02:00"));
        assert_eq!(time("9h30"), guessed("09:30"));
        assert_eq!(time("9"), guessed("09:00"));
        assert_eq!(time("24:00"), None);
        assert_eq!(time("10:7"), None);
        assert_eq!(time("2460"), None);
        assert_eq!(time("noon"), None);
    }

    #[test]
    fn twelve_hour_times() {
        assert_eq!(time("2pm"), exact("14:00"));
        assert_eq!(time("2:30 PM"), exact("14:30"));
        assert_eq!(time("12am"), exact("00:00"));
        assert_eq!(time("12:15pm"), exact("12:15"));
        assert_eq!(time("9 am"), exact("09:00"));
        assert_eq!(time("13pm"), None);
        assert_eq!(time("0am"), None);
    }

    #[test]
    fn localized_display() {
        assert_eq!(display_date("2026-02-05", Locale::Fr), "5 février 2026");
        assert_eq!(display_date("2026-02-05", Locale::En), "February 5, 2026");
        assert_eq!(display_date("2026-02-05", Locale::He), "05/02/2026");
        assert_eq!(display_time("14:00", Locale::Fr), "14h");
        assert_eq!(display_time("09:30", Locale::Fr), "9h30");
        assert_eq!(display_time("14:30", Locale::En), "2:30 PM");
        assert_eq!(display_time("00:15", Locale::En), "12:15 AM");
        assert_eq!(display_time("14:30", Locale::He), "14:30");
    }

    #[test]
    fn only_dates_and_times_are_reformatted() {
        assert_eq!(display_value("2026-02-05", Locale::Fr), "5 février 2026");
        assert_eq!(display_value("14:30", Locale::En), "2:30 PM");
        assert_eq!(display_value("Dana", Locale::Fr), "Dana");
        assert_eq!(display_value("0501234567", Locale::En), "0501234567");
    }
}
