// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module CRUD. The tagged [`ModuleDefinition`] is split across the
//! `module_type`, `validation_format_code`, `choices` and `llm_config` columns.

use messenger_core::MessengerError;
use messenger_core::types::{Choice, LlmConfig, Module, ModuleDefinition, ModuleDraft, ModuleType};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use super::{Write, get_enum, get_json, get_opt_json, get_ts, new_id, now_ts, to_json, to_opt_json};
use crate::database::Database;

const COLUMNS: &str = "id, ref_code, name, module_type, content, params, validation_format_code, \
                       choices, llm_config, custom_error_message, success_message, \
                       failure_message, category, is_active, created_at, updated_at";

fn row_to_module(row: &rusqlite::Row<'_>) -> rusqlite::Result<Module> {
    let module_type: ModuleType = get_enum(row, 3)?;
    let choices: Option<Vec<Choice>> = get_opt_json(row, 7)?;
    let llm_config: Option<LlmConfig> = get_opt_json(row, 8)?;
    let definition = ModuleDefinition::from_parts(module_type, row.get(6)?, choices, llm_config)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Module {
        id: row.get(0)?,
        ref_code: row.get(1)?,
        name: row.get(2)?,
        content: get_json(row, 4)?,
        params: get_json(row, 5)?,
        definition,
        custom_error_message: get_opt_json(row, 9)?,
        success_message: get_opt_json(row, 10)?,
        failure_message: get_opt_json(row, 11)?,
        category: row.get(12)?,
        is_active: row.get(13)?,
        created_at: get_ts(row, 14)?,
        updated_at: get_ts(row, 15)?,
    })
}

fn select_where(
    conn: &Connection,
    column: &str,
    value: &str,
) -> rusqlite::Result<Option<Module>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messenger_modules WHERE {column} = ?1"),
        params![value],
        row_to_module,
    )
    .optional()
}

fn ref_taken(conn: &Connection, ref_code: &str, except_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM messenger_modules WHERE ref_code = ?1 AND id != ?2)",
        params![ref_code, except_id],
        |row| row.get(0),
    )
}

/// Column values of a draft, in `COLUMNS` order from `name` to `is_active`.
struct DraftColumns {
    module_type: String,
    content: String,
    params: String,
    validation_format_code: Option<String>,
    choices: Option<String>,
    llm_config: Option<String>,
    custom_error_message: Option<String>,
    success_message: Option<String>,
    failure_message: Option<String>,
}

impl DraftColumns {
    fn from_draft(draft: &ModuleDraft) -> rusqlite::Result<Self> {
        Ok(Self {
            module_type: draft.definition.module_type().to_string(),
            content: to_json(&draft.content)?,
            params: to_json(&draft.params)?,
            validation_format_code: draft
                .definition
                .validation_format_code()
                .map(str::to_string),
            choices: to_opt_json(draft.definition.choices().map(|c| c.to_vec()).as_ref())?,
            llm_config: to_opt_json(draft.definition.llm_config())?,
            custom_error_message: to_opt_json(draft.custom_error_message.as_ref())?,
            success_message: to_opt_json(draft.success_message.as_ref())?,
            failure_message: to_opt_json(draft.failure_message.as_ref())?,
        })
    }
}

fn duplicate(ref_code: &str) -> Write<Module> {
    Write::Duplicate(format!("module ref_code `{ref_code}` already exists"))
}

pub async fn list_modules(db: &Database) -> Result<Vec<Module>, MessengerError> {
    db.call(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messenger_modules ORDER BY category, ref_code"
        ))?;
        let rows = stmt.query_map([], row_to_module)?;
        rows.collect()
    })
    .await
}

pub async fn get_module(db: &Database, id: &str) -> Result<Option<Module>, MessengerError> {
    let id = id.to_string();
    db.call(move |conn| select_where(conn, "id", &id)).await
}

pub async fn get_module_by_ref(
    db: &Database,
    ref_code: &str,
) -> Result<Option<Module>, MessengerError> {
    let ref_code = ref_code.to_string();
    db.call(move |conn| select_where(conn, "ref_code", &ref_code))
        .await
}

pub async fn create_module(db: &Database, draft: &ModuleDraft) -> Result<Module, MessengerError> {
    let draft = draft.clone();
    let id = new_id();
    let module_id = id.clone();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        if ref_taken(&tx, &draft.ref_code, &module_id)? {
            return Ok(duplicate(&draft.ref_code));
        }
        let cols = DraftColumns::from_draft(&draft)?;
        let now = now_ts();
        tx.execute(
            &format!(
                "INSERT INTO messenger_modules ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)"
            ),
            params![
                module_id,
                draft.ref_code,
                draft.name,
                cols.module_type,
                cols.content,
                cols.params,
                cols.validation_format_code,
                cols.choices,
                cols.llm_config,
                cols.custom_error_message,
                cols.success_message,
                cols.failure_message,
                draft.category,
                draft.is_active,
                now,
            ],
        )?;
        let created = select_where(&tx, "id", &module_id)?;
        tx.commit()?;
        Ok(created.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("module", &id)
}

pub async fn update_module(
    db: &Database,
    id: &str,
    draft: &ModuleDraft,
) -> Result<Module, MessengerError> {
    let draft = draft.clone();
    let module_id = id.to_string();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        if select_where(&tx, "id", &module_id)?.is_none() {
            return Ok(Write::Missing);
        }
        if ref_taken(&tx, &draft.ref_code, &module_id)? {
            return Ok(duplicate(&draft.ref_code));
        }
        let cols = DraftColumns::from_draft(&draft)?;
        tx.execute(
            "UPDATE messenger_modules
             SET ref_code = ?2, name = ?3, module_type = ?4, content = ?5, params = ?6,
                 validation_format_code = ?7, choices = ?8, llm_config = ?9,
                 custom_error_message = ?10, success_message = ?11, failure_message = ?12,
                 category = ?13, is_active = ?14, updated_at = ?15
             WHERE id = ?1",
            params![
                module_id,
                draft.ref_code,
                draft.name,
                cols.module_type,
                cols.content,
                cols.params,
                cols.validation_format_code,
                cols.choices,
                cols.llm_config,
                cols.custom_error_message,
                cols.success_message,
                cols.failure_message,
                draft.category,
                draft.is_active,
                now_ts(),
            ],
        )?;
        let updated = select_where(&tx, "id", &module_id)?;
        tx.commit()?;
        Ok(updated.map(Write::Done).unwrap_or(Write::Missing))
    })
    .await?
    .into_result("module", id)
}

pub async fn delete_module(db: &Database, id: &str) -> Result<(), MessengerError> {
    let module_id = id.to_string();
    let deleted = db
        .call(move |conn| {
            conn.execute("DELETE FROM messenger_modules WHERE id = ?1", params![module_id])
        })
        .await?;
    if deleted == 0 {
        return Err(MessengerError::not_found("module", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_core::types::{Locale, LocalizedText};
    use tempfile::tempdir;

    async fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("modules.db").to_str().unwrap(), true)
            .await
            .unwrap();
        (dir, db)
    }

    fn choice_draft(ref_code: &str) -> ModuleDraft {
        ModuleDraft {
            ref_code: ref_code.to_string(),
            name: "Confirm".into(),
            content: LocalizedText::single(Locale::En, "Confirm?"),
            params: serde_json::Value::Null,
            definition: ModuleDefinition::Choice {
                choices: vec![
                    Choice {
                        id: "yes".into(),
                        label: LocalizedText::single(Locale::En, "Yes"),
                        next_step_ref: None,
                    },
                    Choice {
                        id: "no".into(),
                        label: LocalizedText::single(Locale::En, "No"),
                        next_step_ref: Some("ASK_NAME".into()),
                    },
                ],
            },
            custom_error_message: None,
            success_message: Some(LocalizedText::single(Locale::En, "Thanks!")),
            failure_message: Some(LocalizedText::single(Locale::En, "Pick one")),
            category: "general".into(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn choice_module_survives_storage() {
        let (_dir, db) = setup().await;
        let draft = choice_draft("CONFIRM");
        let created = create_module(&db, &draft).await.unwrap();

        let loaded = get_module_by_ref(&db, "CONFIRM").await.unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.definition, draft.definition);
        assert_eq!(loaded.success_message, draft.success_message);
        assert!(loaded.custom_error_message.is_none());
    }

    #[tokio::test]
    async fn update_switches_module_type() {
        let (_dir, db) = setup().await;
        let created = create_module(&db, &choice_draft("PHONE")).await.unwrap();

        let mut draft = choice_draft("PHONE");
        draft.definition = ModuleDefinition::ValidatedField {
            validation_format_code: "israeli_phone".into(),
        };
        let updated = update_module(&db, &created.id, &draft).await.unwrap();
        assert_eq!(updated.module_type(), ModuleType::ValidatedField);
        assert_eq!(
            updated.definition.validation_format_code(),
            Some("israeli_phone")
        );
        assert!(updated.definition.choices().is_none());
    }

    #[tokio::test]
    async fn duplicate_ref_code_is_rejected() {
        let (_dir, db) = setup().await;
        create_module(&db, &choice_draft("DUP")).await.unwrap();
        let err = create_module(&db, &choice_draft("DUP")).await.unwrap_err();
        assert!(matches!(err, MessengerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_unknown_module_is_not_found() {
        let (_dir, db) = setup().await;
        let err = delete_module(&db, "nope").await.unwrap_err();
        assert!(matches!(err, MessengerError::NotFound { entity: "module", .. }));
    }
}
