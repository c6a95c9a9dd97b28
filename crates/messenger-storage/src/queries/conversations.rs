// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rows and the transactional writes that go with them.
//!
//! Every write bumps `version`. [`commit_turn`] additionally requires the
//! caller's version to still match, so a turn computed from a stale read is
//! rejected instead of overwriting a concurrent one.

use chrono::{DateTime, Utc};
use messenger_core::MessengerError;
use messenger_core::types::{
    Conversation, ConversationFilter, ConversationStatus, Locale, Message, NewConversation,
    NewMessage,
};
use rusqlite::{Connection, OptionalExtension, params};

use super::messages::insert_message;
use super::{Write, get_enum, get_json, get_opt_ts, get_ts, new_id, now_ts, to_json, ts};
use crate::database::Database;

const COLUMNS: &str = "id, session_id, branch_id, contact_id, workflow_id, current_step_ref, \
                       status, locale, collected_data, started_at, last_activity_at, \
                       completed_at, clara_paused, clara_paused_until, needs_human, \
                       needs_human_reason, last_message, version";

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let status: ConversationStatus = get_enum(row, 6)?;
    let locale: Locale = get_enum(row, 7)?;
    Ok(Conversation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        branch_id: row.get(2)?,
        contact_id: row.get(3)?,
        workflow_id: row.get(4)?,
        current_step_ref: row.get(5)?,
        status,
        locale,
        collected_data: get_json(row, 8)?,
        started_at: get_ts(row, 9)?,
        last_activity_at: get_ts(row, 10)?,
        completed_at: get_opt_ts(row, 11)?,
        clara_paused: row.get(12)?,
        clara_paused_until: get_opt_ts(row, 13)?,
        needs_human: row.get(14)?,
        needs_human_reason: row.get(15)?,
        last_message: row.get(16)?,
        version: row.get(17)?,
    })
}

fn select_conversation(conn: &Connection, id: &str) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messenger_conversations WHERE id = ?1"),
        params![id],
        row_to_conversation,
    )
    .optional()
}

/// Run `apply` against a conversation inside one transaction, bump its
/// version and return the stored row.
///
/// Terminal conversations are rejected unless `allow_terminal` is set.
async fn mutate<F, T>(
    db: &Database,
    id: &str,
    allow_terminal: bool,
    apply: F,
) -> Result<(Conversation, T), MessengerError>
where
    F: FnOnce(&Connection, &Conversation, &str) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let conversation_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = select_conversation(&tx, &conversation_id)? else {
            return Ok(Write::Missing);
        };
        if !allow_terminal && current.status.is_terminal() {
            return Ok(Write::Closed(current.status));
        }
        let now = now_ts();
        let extra = apply(&*tx, &current, &now)?;
        tx.execute(
            "UPDATE messenger_conversations
             SET version = version + 1, last_activity_at = ?2
             WHERE id = ?1",
            params![conversation_id, now],
        )?;
        let stored = select_conversation(&tx, &conversation_id)?;
        tx.commit()?;
        Ok(match stored {
            Some(conversation) => Write::Done((conversation, extra)),
            None => Write::Missing,
        })
    })
    .await?
    .into_result("conversation", id)
}

pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, MessengerError> {
    let id = id.to_string();
    db.call(move |conn| select_conversation(conn, &id)).await
}

pub async fn find_active_conversation(
    db: &Database,
    session_id: &str,
) -> Result<Option<Conversation>, MessengerError> {
    let session_id = session_id.to_string();
    db.call(move |conn| {
        conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM messenger_conversations
                 WHERE session_id = ?1 AND status = 'active'
                 ORDER BY started_at DESC, rowid DESC LIMIT 1"
            ),
            params![session_id],
            row_to_conversation,
        )
        .optional()
    })
    .await
}

pub async fn list_conversations(
    db: &Database,
    filter: &ConversationFilter,
) -> Result<Vec<Conversation>, MessengerError> {
    let status = filter.status.map(|s| s.to_string());
    let needs_human = filter.needs_human;
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_conversations
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR needs_human = ?2)
             ORDER BY last_activity_at DESC, rowid DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![status, needs_human, limit], row_to_conversation)?;
        rows.collect()
    })
    .await
}

/// Insert a conversation positioned on its entry step, with its first message.
pub async fn create_conversation(
    db: &Database,
    new: &NewConversation,
    first_message: &NewMessage,
) -> Result<Conversation, MessengerError> {
    let new = new.clone();
    let first = first_message.clone();
    let id = new_id();
    let conversation_id = id.clone();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let now = now_ts();
        tx.execute(
            "INSERT INTO messenger_conversations
                (id, session_id, branch_id, contact_id, workflow_id, current_step_ref,
                 status, locale, collected_data, started_at, last_activity_at, last_message,
                 version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7, '{}', ?8, ?8, ?9, 0)",
            params![
                conversation_id,
                new.session_id,
                new.branch_id,
                new.contact_id,
                new.workflow_id,
                new.entry_step_ref,
                new.locale.as_str(),
                now,
                first.content,
            ],
        )?;
        insert_message(&tx, &conversation_id, &first, &now)?;
        let created = select_conversation(&tx, &conversation_id)?;
        tx.commit()?;
        Ok(created.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("conversation", &id)
}

/// Append the turn's messages and write the cursor, guarded by version.
pub async fn commit_turn(
    db: &Database,
    conversation: &Conversation,
    messages: &[NewMessage],
) -> Result<Conversation, MessengerError> {
    let next = conversation.clone();
    let messages = messages.to_vec();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let stored_version: Option<i64> = tx
            .query_row(
                "SELECT version FROM messenger_conversations WHERE id = ?1",
                params![next.id],
                |row| row.get(0),
            )
            .optional()?;
        match stored_version {
            None => return Ok(Write::Missing),
            Some(version) if version != next.version => return Ok(Write::Stale),
            Some(_) => {}
        }

        let now = now_ts();
        for msg in &messages {
            insert_message(&tx, &next.id, msg, &now)?;
        }
        let last_message = messages.last().map(|m| m.content.clone());
        tx.execute(
            "UPDATE messenger_conversations
             SET current_step_ref = ?3, status = ?4, locale = ?5, collected_data = ?6,
                 completed_at = CASE WHEN ?4 != 'active'
                                     THEN COALESCE(completed_at, ?7) ELSE NULL END,
                 clara_paused = ?8, clara_paused_until = ?9,
                 needs_human = ?10, needs_human_reason = ?11,
                 last_message = COALESCE(?12, last_message),
                 last_activity_at = ?7, version = version + 1
             WHERE id = ?1 AND version = ?2",
            params![
                next.id,
                next.version,
                next.current_step_ref,
                next.status.to_string(),
                next.locale.as_str(),
                to_json(&next.collected_data)?,
                now,
                next.clara_paused,
                next.clara_paused_until.map(ts),
                next.needs_human,
                next.needs_human_reason,
                last_message,
            ],
        )?;
        let stored = select_conversation(&tx, &next.id)?;
        tx.commit()?;
        Ok(stored.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("conversation", &conversation.id)
}

/// Append a message without touching the cursor or the version.
pub async fn append_message(
    db: &Database,
    conversation_id: &str,
    message: &NewMessage,
) -> Result<Message, MessengerError> {
    let msg = message.clone();
    let id = conversation_id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        if select_conversation(&tx, &id)?.is_none() {
            return Ok(Write::Missing);
        }
        let now = now_ts();
        let stored = insert_message(&tx, &id, &msg, &now)?;
        tx.execute(
            "UPDATE messenger_conversations SET last_message = ?2, last_activity_at = ?3
             WHERE id = ?1",
            params![id, msg.content, now],
        )?;
        tx.commit()?;
        Ok(Write::Done(stored))
    })
    .await?
    .into_result("conversation", conversation_id)
}

pub async fn agent_send(
    db: &Database,
    conversation_id: &str,
    message: &NewMessage,
    paused_until: DateTime<Utc>,
) -> Result<(Conversation, Message), MessengerError> {
    let msg = message.clone();
    let until = ts(paused_until);
    mutate(db, conversation_id, false, move |conn, current, now| {
        let stored = insert_message(conn, &current.id, &msg, now)?;
        conn.execute(
            "UPDATE messenger_conversations
             SET clara_paused = 1, clara_paused_until = ?2, last_message = ?3
             WHERE id = ?1",
            params![current.id, until, msg.content],
        )?;
        Ok(stored)
    })
    .await
}

pub async fn set_clara_paused(
    db: &Database,
    conversation_id: &str,
    paused: bool,
    paused_until: Option<DateTime<Utc>>,
) -> Result<Conversation, MessengerError> {
    let until = if paused { paused_until.map(ts) } else { None };
    let (conversation, ()) = mutate(db, conversation_id, false, move |conn, current, _| {
        conn.execute(
            "UPDATE messenger_conversations SET clara_paused = ?2, clara_paused_until = ?3
             WHERE id = ?1",
            params![current.id, paused, until],
        )?;
        Ok(())
    })
    .await?;
    Ok(conversation)
}

pub async fn resolve_human(
    db: &Database,
    conversation_id: &str,
) -> Result<Conversation, MessengerError> {
    let (conversation, ()) = mutate(db, conversation_id, true, |conn, current, _| {
        conn.execute(
            "UPDATE messenger_conversations SET needs_human = 0, needs_human_reason = NULL
             WHERE id = ?1",
            params![current.id],
        )?;
        Ok(())
    })
    .await?;
    Ok(conversation)
}

pub async fn close_conversation(
    db: &Database,
    conversation_id: &str,
    status: ConversationStatus,
) -> Result<Conversation, MessengerError> {
    if !status.is_terminal() {
        return Err(MessengerError::InvalidInput(format!(
            "cannot close a conversation into `{status}`"
        )));
    }
    let status = status.to_string();
    let (conversation, ()) = mutate(db, conversation_id, false, move |conn, current, now| {
        conn.execute(
            "UPDATE messenger_conversations SET status = ?2, completed_at = ?3 WHERE id = ?1",
            params![current.id, status, now],
        )?;
        Ok(())
    })
    .await?;
    Ok(conversation)
}

pub async fn link_contact(
    db: &Database,
    conversation_id: &str,
    contact_id: &str,
    branch_id: Option<&str>,
) -> Result<Conversation, MessengerError> {
    let contact_id = contact_id.to_string();
    let branch_id = branch_id.map(str::to_string);
    let (conversation, ()) = mutate(db, conversation_id, true, move |conn, current, _| {
        conn.execute(
            "UPDATE messenger_conversations
             SET contact_id = ?2, branch_id = COALESCE(?3, branch_id)
             WHERE id = ?1",
            params![current.id, contact_id, branch_id],
        )?;
        Ok(())
    })
    .await?;
    Ok(conversation)
}
