// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow step CRUD with entry-point bookkeeping.
//!
//! Every workflow with steps has exactly one entry point. The first step is
//! always the entry point whatever the caller asked for; flagging another step
//! moves the flag; deleting the entry point promotes the lowest `order_index`
//! sibling. An entry point cannot be unflagged directly.

use messenger_core::MessengerError;
use messenger_core::types::{StepDraft, WorkflowStep};
use rusqlite::{Connection, OptionalExtension, params};

use super::workflows::select_workflow;
use super::{Write, get_ts, new_id, now_ts};
use crate::database::Database;

const COLUMNS: &str = "id, workflow_id, step_ref, step_name, module_ref, is_entry_point, \
                       order_index, next_step_ref, created_at";

fn row_to_step(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowStep> {
    Ok(WorkflowStep {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        step_ref: row.get(2)?,
        step_name: row.get(3)?,
        module_ref: row.get(4)?,
        is_entry_point: row.get(5)?,
        order_index: row.get(6)?,
        next_step_ref: row.get(7)?,
        created_at: get_ts(row, 8)?,
    })
}

fn select_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<WorkflowStep>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messenger_workflow_steps WHERE id = ?1"),
        params![id],
        row_to_step,
    )
    .optional()
}

fn ref_taken(
    conn: &Connection,
    workflow_id: &str,
    step_ref: &str,
    except_id: Option<&str>,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM messenger_workflow_steps
                       WHERE workflow_id = ?1 AND step_ref = ?2 AND id != COALESCE(?3, ''))",
        params![workflow_id, step_ref, except_id],
        |row| row.get(0),
    )
}

fn clear_entry_points(conn: &Connection, workflow_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE messenger_workflow_steps SET is_entry_point = 0
         WHERE workflow_id = ?1 AND is_entry_point = 1",
        params![workflow_id],
    )?;
    Ok(())
}

fn duplicate(step_ref: &str) -> Write<WorkflowStep> {
    Write::Duplicate(format!("step_ref `{step_ref}` already exists in this workflow"))
}

/// List the steps of a workflow in display order.
pub async fn list_steps(
    db: &Database,
    workflow_id: &str,
) -> Result<Vec<WorkflowStep>, MessengerError> {
    let workflow_id = workflow_id.to_string();
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_workflow_steps
             WHERE workflow_id = ?1 ORDER BY order_index, created_at"
        ))?;
        let rows = stmt.query_map(params![workflow_id], row_to_step)?;
        rows.collect()
    })
    .await
}

pub async fn get_step(
    db: &Database,
    workflow_id: &str,
    step_ref: &str,
) -> Result<Option<WorkflowStep>, MessengerError> {
    let workflow_id = workflow_id.to_string();
    let step_ref = step_ref.to_string();
    db.call(move |conn| {
        conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM messenger_workflow_steps
                 WHERE workflow_id = ?1 AND step_ref = ?2"
            ),
            params![workflow_id, step_ref],
            row_to_step,
        )
        .optional()
    })
    .await
}

pub async fn get_step_by_id(db: &Database, id: &str) -> Result<Option<WorkflowStep>, MessengerError> {
    let id = id.to_string();
    db.call(move |conn| select_by_id(conn, &id)).await
}

pub async fn get_entry_step(
    db: &Database,
    workflow_id: &str,
) -> Result<Option<WorkflowStep>, MessengerError> {
    let workflow_id = workflow_id.to_string();
    db.call(move |conn| {
        conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM messenger_workflow_steps
                 WHERE workflow_id = ?1 AND is_entry_point = 1"
            ),
            params![workflow_id],
            row_to_step,
        )
        .optional()
    })
    .await
}

/// Create a step. The first step of a workflow becomes the entry point
/// unconditionally.
pub async fn create_step(
    db: &Database,
    workflow_id: &str,
    draft: &StepDraft,
) -> Result<WorkflowStep, MessengerError> {
    let draft = draft.clone();
    let wf_id = workflow_id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        if select_workflow(&tx, &wf_id)?.is_none() {
            return Ok(Write::Missing);
        }
        if ref_taken(&tx, &wf_id, &draft.step_ref, None)? {
            return Ok(duplicate(&draft.step_ref));
        }

        let (count, max_order): (i64, Option<i64>) = tx.query_row(
            "SELECT COUNT(*), MAX(order_index) FROM messenger_workflow_steps WHERE workflow_id = ?1",
            params![wf_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let is_entry_point = count == 0 || draft.is_entry_point;
        if is_entry_point {
            clear_entry_points(&tx, &wf_id)?;
        }
        let order_index = draft
            .order_index
            .unwrap_or_else(|| max_order.map_or(0, |max| max + 1));

        let id = new_id();
        tx.execute(
            "INSERT INTO messenger_workflow_steps
                 (id, workflow_id, step_ref, step_name, module_ref, is_entry_point,
                  order_index, next_step_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                wf_id,
                draft.step_ref,
                draft.step_name,
                draft.module_ref,
                is_entry_point,
                order_index,
                draft.next_step_ref,
                now_ts(),
            ],
        )?;
        let created = select_by_id(&tx, &id)?;
        tx.commit()?;
        Ok(created.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("workflow", workflow_id)
}

/// Replace a step's attributes. Flagging it as entry point clears its siblings.
pub async fn update_step(
    db: &Database,
    id: &str,
    draft: &StepDraft,
) -> Result<WorkflowStep, MessengerError> {
    let draft = draft.clone();
    let step_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let Some(existing) = select_by_id(&tx, &step_id)? else {
            return Ok(Write::Missing);
        };
        if ref_taken(&tx, &existing.workflow_id, &draft.step_ref, Some(step_id.as_str()))? {
            return Ok(duplicate(&draft.step_ref));
        }

        let is_entry_point = existing.is_entry_point || draft.is_entry_point;
        if draft.is_entry_point && !existing.is_entry_point {
            clear_entry_points(&tx, &existing.workflow_id)?;
        }
        tx.execute(
            "UPDATE messenger_workflow_steps
             SET step_ref = ?2, step_name = ?3, module_ref = ?4, is_entry_point = ?5,
                 order_index = ?6, next_step_ref = ?7
             WHERE id = ?1",
            params![
                step_id,
                draft.step_ref,
                draft.step_name,
                draft.module_ref,
                is_entry_point,
                draft.order_index.unwrap_or(existing.order_index),
                draft.next_step_ref,
            ],
        )?;
        let updated = select_by_id(&tx, &step_id)?;
        tx.commit()?;
        Ok(updated.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("step", id)
}

/// Delete a step, promoting the first remaining sibling if it was the entry point.
pub async fn delete_step(db: &Database, id: &str) -> Result<(), MessengerError> {
    let step_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let Some(existing) = select_by_id(&tx, &step_id)? else {
            return Ok(Write::Missing);
        };
        tx.execute(
            "DELETE FROM messenger_workflow_steps WHERE id = ?1",
            params![step_id],
        )?;
        if existing.is_entry_point {
            tx.execute(
                "UPDATE messenger_workflow_steps SET is_entry_point = 1
                 WHERE id = (SELECT id FROM messenger_workflow_steps WHERE workflow_id = ?1
                             ORDER BY order_index, created_at LIMIT 1)",
                params![existing.workflow_id],
            )?;
        }
        tx.commit()?;
        Ok(Write::Done(()))
    })
    .await?
    .into_result("step", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::workflows::create_workflow;
    use messenger_core::types::WorkflowDraft;
    use tempfile::tempdir;

    async fn setup() -> (tempfile::TempDir, Database, String) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("steps.db").to_str().unwrap(), true)
            .await
            .unwrap();
        let wf = create_workflow(
            &db,
            &WorkflowDraft {
                name: "main".into(),
                description: None,
                is_active: true,
            },
        )
        .await
        .unwrap();
        (dir, db, wf.id)
    }

    fn draft(step_ref: &str, entry: bool) -> StepDraft {
        StepDraft {
            step_ref: step_ref.to_string(),
            step_name: step_ref.to_lowercase(),
            module_ref: format!("MOD_{step_ref}"),
            is_entry_point: entry,
            order_index: None,
            next_step_ref: None,
        }
    }

    #[tokio::test]
    async fn first_step_is_entry_point_even_when_caller_says_no() {
        let (_dir, db, wf) = setup().await;
        let first = create_step(&db, &wf, &draft("ASK_NAME", false)).await.unwrap();
        assert!(first.is_entry_point);
        assert_eq!(first.order_index, 0);

        let second = create_step(&db, &wf, &draft("ASK_PHONE", false)).await.unwrap();
        assert!(!second.is_entry_point);
        assert_eq!(second.order_index, 1);
    }

    #[tokio::test]
    async fn flagging_a_new_entry_point_clears_siblings() {
        let (_dir, db, wf) = setup().await;
        let first = create_step(&db, &wf, &draft("A", false)).await.unwrap();
        let second = create_step(&db, &wf, &draft("B", true)).await.unwrap();
        assert!(second.is_entry_point);
        let first = get_step_by_id(&db, &first.id).await.unwrap().unwrap();
        assert!(!first.is_entry_point);

        let updated = update_step(&db, &first.id, &draft("A", true)).await.unwrap();
        assert!(updated.is_entry_point);
        let entry = get_entry_step(&db, &wf).await.unwrap().unwrap();
        assert_eq!(entry.id, first.id);
    }

    #[tokio::test]
    async fn entry_point_cannot_be_unflagged_by_update() {
        let (_dir, db, wf) = setup().await;
        let only = create_step(&db, &wf, &draft("A", true)).await.unwrap();
        let updated = update_step(&db, &only.id, &draft("A", false)).await.unwrap();
        assert!(updated.is_entry_point);
    }

    #[tokio::test]
    async fn deleting_entry_point_promotes_a_sibling() {
        let (_dir, db, wf) = setup().await;
        let a = create_step(&db, &wf, &draft("A", false)).await.unwrap();
        let b = create_step(&db, &wf, &draft("B", false)).await.unwrap();
        create_step(&db, &wf, &draft("C", false)).await.unwrap();

        delete_step(&db, &a.id).await.unwrap();
        let entry = get_entry_step(&db, &wf).await.unwrap().unwrap();
        assert_eq!(entry.id, b.id);
    }

    #[tokio::test]
    async fn duplicate_step_ref_is_rejected() {
        let (_dir, db, wf) = setup().await;
        create_step(&db, &wf, &draft("A", false)).await.unwrap();
        let err = create_step(&db, &wf, &draft("A", false)).await.unwrap_err();
        assert!(matches!(err, MessengerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn step_in_unknown_workflow_is_not_found() {
        let (_dir, db, _wf) = setup().await;
        let err = create_step(&db, "missing", &draft("A", false)).await.unwrap_err();
        assert!(matches!(err, MessengerError::NotFound { entity: "workflow", .. }));
    }

    #[tokio::test]
    async fn lookup_by_ref_is_scoped_to_workflow() {
        let (_dir, db, wf) = setup().await;
        create_step(&db, &wf, &draft("A", false)).await.unwrap();
        assert!(get_step(&db, &wf, "A").await.unwrap().is_some());
        assert!(get_step(&db, "other", "A").await.unwrap().is_none());
        assert_eq!(list_steps(&db, &wf).await.unwrap().len(), 1);
    }
}
