// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript rows. Messages are only ever inserted; rowid order is the
//! order in which they were written.

use messenger_core::MessengerError;
use messenger_core::types::{Message, MessageRole, NewMessage};
use rusqlite::{Connection, params};

use super::{get_enum, get_opt_json, get_ts, new_id, parse_ts, to_opt_json};
use crate::database::Database;

const COLUMNS: &str = "id, conversation_id, role, content, step_ref, metadata, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: MessageRole = get_enum(row, 2)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        step_ref: row.get(4)?,
        metadata: get_opt_json(row, 5)?,
        created_at: get_ts(row, 6)?,
    })
}

/// Insert one message inside the caller's transaction.
pub(crate) fn insert_message(
    conn: &Connection,
    conversation_id: &str,
    msg: &NewMessage,
    created_at: &str,
) -> rusqlite::Result<Message> {
    let id = new_id();
    conn.execute(
        &format!("INSERT INTO messenger_messages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            id,
            conversation_id,
            msg.role.to_string(),
            msg.content,
            msg.step_ref,
            to_opt_json(msg.metadata.as_ref())?,
            created_at,
        ],
    )?;
    Ok(Message {
        id,
        conversation_id: conversation_id.to_string(),
        role: msg.role,
        content: msg.content.clone(),
        step_ref: msg.step_ref.clone(),
        metadata: msg.metadata.clone(),
        created_at: parse_ts(6, created_at)?,
    })
}

/// Full transcript of a conversation, oldest first.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, MessengerError> {
    let conversation_id = conversation_id.to_string();
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_messages
             WHERE conversation_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map(params![conversation_id], row_to_message)?;
        rows.collect()
    })
    .await
}
