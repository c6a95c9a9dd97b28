// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.
//!
//! Column conversions shared by every module live here: timestamps are
//! RFC 3339 text with millisecond precision, structured values are JSON text,
//! enums are their lowercase string form.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use messenger_core::MessengerError;
use messenger_core::types::ConversationStatus;
use rusqlite::types::Type;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod conversations;
pub mod faq;
pub mod formats;
pub mod messages;
pub mod modules;
pub mod settings;
pub mod steps;
pub mod workflows;

/// Outcome of a write whose expected failures are domain errors, not SQL errors.
///
/// Closures running on the writer thread can only fail with `rusqlite::Error`,
/// so they report these cases as values and the caller converts them.
#[derive(Debug)]
pub(crate) enum Write<T> {
    Done(T),
    Missing,
    Duplicate(String),
    Stale,
    Closed(ConversationStatus),
}

impl<T> Write<T> {
    pub(crate) fn into_result(self, entity: &'static str, id: &str) -> Result<T, MessengerError> {
        match self {
            Write::Done(value) => Ok(value),
            Write::Missing => Err(MessengerError::not_found(entity, id)),
            Write::Duplicate(message) => Err(MessengerError::InvalidInput(message)),
            Write::Stale => Err(MessengerError::Conflict {
                conversation_id: id.to_string(),
            }),
            Write::Closed(status) => Err(MessengerError::ConversationClosed {
                conversation_id: id.to_string(),
                status,
            }),
        }
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn now_ts() -> String {
    ts(Utc::now())
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn get_opt_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_ts(idx, &raw)).transpose()
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn to_opt_json<T: Serialize>(value: Option<&T>) -> rusqlite::Result<Option<String>> {
    value.map(to_json).transpose()
}

pub(crate) fn get_json<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_opt_json<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a text column through the type's `FromStr` (strum enums).
pub(crate) fn get_enum<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
