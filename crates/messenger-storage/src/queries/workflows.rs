// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow CRUD and single-active-workflow enforcement.

use messenger_core::MessengerError;
use messenger_core::types::{Workflow, WorkflowDraft};
use rusqlite::{Connection, OptionalExtension, params};

use super::{Write, get_ts, new_id, now_ts};
use crate::database::Database;

const COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

fn row_to_workflow(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workflow> {
    Ok(Workflow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_active: row.get(3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}

pub(crate) fn select_workflow(conn: &Connection, id: &str) -> rusqlite::Result<Option<Workflow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messenger_workflows WHERE id = ?1"),
        params![id],
        row_to_workflow,
    )
    .optional()
}

/// Deactivates every workflow except `keep`.
fn deactivate_others(conn: &Connection, keep: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE messenger_workflows SET is_active = 0, updated_at = ?2
         WHERE is_active = 1 AND id != ?1",
        params![keep, now],
    )?;
    Ok(())
}

pub async fn list_workflows(db: &Database) -> Result<Vec<Workflow>, MessengerError> {
    db.call(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_workflows ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_workflow)?;
        rows.collect()
    })
    .await
}

pub async fn get_workflow(db: &Database, id: &str) -> Result<Option<Workflow>, MessengerError> {
    let id = id.to_string();
    db.call(move |conn| select_workflow(conn, &id)).await
}

pub async fn get_active_workflow(db: &Database) -> Result<Option<Workflow>, MessengerError> {
    db.call(|conn| {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM messenger_workflows WHERE is_active = 1 LIMIT 1"),
            [],
            row_to_workflow,
        )
        .optional()
    })
    .await
}

/// Create a workflow. An active draft deactivates all others in the same transaction.
pub async fn create_workflow(
    db: &Database,
    draft: &WorkflowDraft,
) -> Result<Workflow, MessengerError> {
    let draft = draft.clone();
    let id = new_id();
    let workflow_id = id.clone();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let now = now_ts();
        if draft.is_active {
            deactivate_others(&tx, &workflow_id, &now)?;
        }
        tx.execute(
            "INSERT INTO messenger_workflows (id, name, description, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![workflow_id, draft.name, draft.description, draft.is_active, now],
        )?;
        let created = select_workflow(&tx, &workflow_id)?;
        tx.commit()?;
        Ok(created.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("workflow", &id)
}

/// Replace a workflow's attributes. An active draft deactivates all others.
pub async fn update_workflow(
    db: &Database,
    id: &str,
    draft: &WorkflowDraft,
) -> Result<Workflow, MessengerError> {
    let draft = draft.clone();
    let workflow_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let now = now_ts();
        if select_workflow(&tx, &workflow_id)?.is_none() {
            return Ok(Write::Missing);
        }
        if draft.is_active {
            deactivate_others(&tx, &workflow_id, &now)?;
        }
        tx.execute(
            "UPDATE messenger_workflows
             SET name = ?2, description = ?3, is_active = ?4, updated_at = ?5
             WHERE id = ?1",
            params![workflow_id, draft.name, draft.description, draft.is_active, now],
        )?;
        let updated = select_workflow(&tx, &workflow_id)?;
        tx.commit()?;
        Ok(updated.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("workflow", id)
}

/// Make `id` the only active workflow.
pub async fn activate_workflow(db: &Database, id: &str) -> Result<Workflow, MessengerError> {
    let workflow_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let now = now_ts();
        if select_workflow(&tx, &workflow_id)?.is_none() {
            return Ok(Write::Missing);
        }
        deactivate_others(&tx, &workflow_id, &now)?;
        tx.execute(
            "UPDATE messenger_workflows SET is_active = 1, updated_at = ?2 WHERE id = ?1",
            params![workflow_id, now],
        )?;
        let activated = select_workflow(&tx, &workflow_id)?;
        tx.commit()?;
        Ok(activated.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("workflow", id)
}

/// Delete a workflow; its steps go with it (`ON DELETE CASCADE`).
pub async fn delete_workflow(db: &Database, id: &str) -> Result<(), MessengerError> {
    let workflow_id = id.to_string();
    let deleted = db
        .call(move |conn| {
            conn.execute(
                "DELETE FROM messenger_workflows WHERE id = ?1",
                params![workflow_id],
            )
        })
        .await?;
    if deleted == 0 {
        return Err(MessengerError::not_found("workflow", id));
    }
    Ok(())
}
