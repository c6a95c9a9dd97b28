// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation format lookup and upsert, keyed by `format_code`.

use messenger_core::MessengerError;
use messenger_core::types::ValidationFormat;
use rusqlite::{Connection, OptionalExtension, params};

use super::{get_json, now_ts, to_json};
use crate::database::Database;

const COLUMNS: &str = "format_code, format_name, validation_regex, validation_function, \
                       error_message, description, is_active";

fn row_to_format(row: &rusqlite::Row<'_>) -> rusqlite::Result<ValidationFormat> {
    Ok(ValidationFormat {
        format_code: row.get(0)?,
        format_name: row.get(1)?,
        validation_regex: row.get(2)?,
        validation_function: row.get(3)?,
        error_message: get_json(row, 4)?,
        description: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn select_format(conn: &Connection, code: &str) -> rusqlite::Result<Option<ValidationFormat>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messenger_validation_formats WHERE format_code = ?1"),
        params![code],
        row_to_format,
    )
    .optional()
}

pub async fn list_validation_formats(
    db: &Database,
    active_only: bool,
) -> Result<Vec<ValidationFormat>, MessengerError> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_validation_formats
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY format_code"
        ))?;
        let rows = stmt.query_map(params![active_only], row_to_format)?;
        rows.collect()
    })
    .await
}

pub async fn get_validation_format(
    db: &Database,
    code: &str,
) -> Result<Option<ValidationFormat>, MessengerError> {
    let code = code.to_string();
    db.call(move |conn| select_format(conn, &code)).await
}

/// Insert or replace a format. `created_at` survives replacement.
pub async fn upsert_validation_format(
    db: &Database,
    format: &ValidationFormat,
) -> Result<ValidationFormat, MessengerError> {
    let format = format.clone();
    let saved = db
        .call(move |conn| {
            let now = now_ts();
            conn.execute(
                "INSERT INTO messenger_validation_formats
                    (format_code, format_name, validation_regex, validation_function,
                     error_message, description, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(format_code) DO UPDATE SET
                    format_name = excluded.format_name,
                    validation_regex = excluded.validation_regex,
                    validation_function = excluded.validation_function,
                    error_message = excluded.error_message,
                    description = excluded.description,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at",
                params![
                    format.format_code,
                    format.format_name,
                    format.validation_regex,
                    format.validation_function,
                    to_json(&format.error_message)?,
                    format.description,
                    format.is_active,
                    now,
                ],
            )?;
            select_format(conn, &format.format_code)
        })
        .await?;
    saved.ok_or_else(|| MessengerError::Internal("upserted format vanished".into()))
}

pub async fn delete_validation_format(db: &Database, code: &str) -> Result<(), MessengerError> {
    let format_code = code.to_string();
    let deleted = db
        .call(move |conn| {
            conn.execute(
                "DELETE FROM messenger_validation_formats WHERE format_code = ?1",
                params![format_code],
            )
        })
        .await?;
    if deleted == 0 {
        return Err(MessengerError::not_found("validation format", code));
    }
    Ok(())
}
