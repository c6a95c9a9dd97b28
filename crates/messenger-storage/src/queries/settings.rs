// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use messenger_core::MessengerError;
use messenger_core::types::MessengerSettings;
use rusqlite::{OptionalExtension, params};

use super::now_ts;
use crate::database::Database;

/// Read the settings row, falling back to defaults if it was never seeded.
pub async fn get_settings(db: &Database) -> Result<MessengerSettings, MessengerError> {
    let row = db
        .call(|conn| {
            conn.query_row(
                "SELECT is_active, welcome_delay_seconds, auto_resume_minutes
                 FROM messenger_settings WHERE id = 1",
                [],
                |row| {
                    Ok(MessengerSettings {
                        is_active: row.get(0)?,
                        welcome_delay_seconds: row.get(1)?,
                        auto_resume_minutes: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await?;
    Ok(row.unwrap_or_default())
}

pub async fn update_settings(
    db: &Database,
    settings: &MessengerSettings,
) -> Result<MessengerSettings, MessengerError> {
    let updated = settings.clone();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO messenger_settings
                (id, is_active, welcome_delay_seconds, auto_resume_minutes, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                is_active = excluded.is_active,
                welcome_delay_seconds = excluded.welcome_delay_seconds,
                auto_resume_minutes = excluded.auto_resume_minutes,
                updated_at = excluded.updated_at",
            params![
                updated.is_active,
                updated.welcome_delay_seconds,
                updated.auto_resume_minutes,
                now_ts(),
            ],
        )
    })
    .await?;
    Ok(settings.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn settings_default_then_update() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("settings.db").to_str().unwrap(), true)
            .await
            .unwrap();
        assert_eq!(get_settings(&db).await.unwrap(), MessengerSettings::default());

        let next = MessengerSettings {
            is_active: false,
            welcome_delay_seconds: 0,
            auto_resume_minutes: 15,
        };
        update_settings(&db, &next).await.unwrap();
        assert_eq!(get_settings(&db).await.unwrap(), next);
    }

    #[tokio::test]
    async fn missing_row_reads_as_defaults() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("settings.db").to_str().unwrap(), true)
            .await
            .unwrap();
        db.call(|conn| conn.execute("DELETE FROM messenger_settings", []))
            .await
            .unwrap();
        assert_eq!(get_settings(&db).await.unwrap(), MessengerSettings::default());
    }
}
