// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FAQ entries and their embedding blobs.

use messenger_core::MessengerError;
use messenger_core::types::{FaqDraft, FaqEntry};
use rusqlite::{Connection, OptionalExtension, params};

use super::{Write, get_json, get_ts, new_id, now_ts, to_json};
use crate::database::Database;

const COLUMNS: &str =
    "id, category, question, answer, order_index, is_active, embedding, created_at, updated_at";

/// Serialize an f32 vector as little-endian bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]. Trailing bytes that do not form a full f32 are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_faq(row: &rusqlite::Row<'_>) -> rusqlite::Result<FaqEntry> {
    let embedding: Option<Vec<u8>> = row.get(6)?;
    Ok(FaqEntry {
        id: row.get(0)?,
        category: row.get(1)?,
        question: get_json(row, 2)?,
        answer: get_json(row, 3)?,
        order_index: row.get(4)?,
        is_active: row.get(5)?,
        embedding: embedding.as_deref().map(blob_to_vec),
        created_at: get_ts(row, 7)?,
        updated_at: get_ts(row, 8)?,
    })
}

fn select_faq(conn: &Connection, id: &str) -> rusqlite::Result<Option<FaqEntry>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messenger_faq WHERE id = ?1"),
        params![id],
        row_to_faq,
    )
    .optional()
}

pub async fn list_faqs(db: &Database, active_only: bool) -> Result<Vec<FaqEntry>, MessengerError> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_faq
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY order_index, created_at"
        ))?;
        let rows = stmt.query_map(params![active_only], row_to_faq)?;
        rows.collect()
    })
    .await
}

pub async fn get_faq(db: &Database, id: &str) -> Result<Option<FaqEntry>, MessengerError> {
    let id = id.to_string();
    db.call(move |conn| select_faq(conn, &id)).await
}

pub async fn create_faq(db: &Database, draft: &FaqDraft) -> Result<FaqEntry, MessengerError> {
    let draft = draft.clone();
    let id = new_id();
    let faq_id = id.clone();
    db.call(move |conn| {
        let now = now_ts();
        conn.execute(
            "INSERT INTO messenger_faq
                (id, category, question, answer, order_index, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                faq_id,
                draft.category,
                to_json(&draft.question)?,
                to_json(&draft.answer)?,
                draft.order_index,
                draft.is_active,
                now,
            ],
        )?;
        Ok(select_faq(conn, &faq_id)?
            .map(Write::Done)
            .unwrap_or(Write::Missing))
    })
    .await?
    .into_result("faq", &id)
}

/// Replace an entry. A changed question or answer drops the stored embedding.
pub async fn update_faq(
    db: &Database,
    id: &str,
    draft: &FaqDraft,
) -> Result<FaqEntry, MessengerError> {
    let draft = draft.clone();
    let faq_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = select_faq(&tx, &faq_id)? else {
            return Ok(Write::Missing);
        };
        let text_changed = current.question != draft.question || current.answer != draft.answer;
        tx.execute(
            "UPDATE messenger_faq
             SET category = ?2, question = ?3, answer = ?4, order_index = ?5, is_active = ?6,
                 embedding = CASE WHEN ?7 THEN NULL ELSE embedding END, updated_at = ?8
             WHERE id = ?1",
            params![
                faq_id,
                draft.category,
                to_json(&draft.question)?,
                to_json(&draft.answer)?,
                draft.order_index,
                draft.is_active,
                text_changed,
                now_ts(),
            ],
        )?;
        let updated = select_faq(&tx, &faq_id)?;
        tx.commit()?;
        Ok(updated.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("faq", id)
}

pub async fn delete_faq(db: &Database, id: &str) -> Result<(), MessengerError> {
    let faq_id = id.to_string();
    let deleted = db
        .call(move |conn| conn.execute("DELETE FROM messenger_faq WHERE id = ?1", params![faq_id]))
        .await?;
    if deleted == 0 {
        return Err(MessengerError::not_found("faq", id));
    }
    Ok(())
}

pub async fn set_faq_embedding(
    db: &Database,
    id: &str,
    embedding: &[f32],
) -> Result<(), MessengerError> {
    let faq_id = id.to_string();
    let blob = vec_to_blob(embedding);
    let updated = db
        .call(move |conn| {
            conn.execute(
                "UPDATE messenger_faq SET embedding = ?2 WHERE id = ?1",
                params![faq_id, blob],
            )
        })
        .await?;
    if updated == 0 {
        return Err(MessengerError::not_found("faq", id));
    }
    Ok(())
}

pub async fn list_faq_embeddings(db: &Database) -> Result<Vec<FaqEntry>, MessengerError> {
    db.call(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_faq
             WHERE is_active = 1 AND embedding IS NOT NULL
             ORDER BY order_index, created_at"
        ))?;
        let rows = stmt.query_map([], row_to_faq)?;
        rows.collect()
    })
    .await
}
