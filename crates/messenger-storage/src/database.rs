// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use messenger_core::MessengerError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into [`MessengerError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MessengerError {
    MessengerError::Storage {
        source: Box::new(e),
    }
}

fn map_sql_err(e: rusqlite::Error) -> MessengerError {
    MessengerError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the messenger database.
///
/// Wraps the single `tokio_rusqlite::Connection` every query goes through.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    wal_mode: bool,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date.
    ///
    /// Migrations run on a short-lived blocking connection before the shared
    /// async connection is opened.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, MessengerError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MessengerError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), MessengerError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(map_sql_err)?;
            apply_pragmas(&conn, wal_mode).map_err(map_sql_err)?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| MessengerError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| MessengerError::Storage {
                source: Box::new(e),
            })?;
        conn.call(move |conn| -> Result<(), rusqlite::Error> { apply_pragmas(conn, wal_mode) })
            .await
            .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn, wal_mode })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run `f` on the writer thread, mapping SQLite failures to [`MessengerError`].
    pub async fn call<F, R>(&self, f: F) -> Result<R, MessengerError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(f).await.map_err(map_tr_err)
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), MessengerError> {
        if !self.wal_mode {
            return Ok(());
        }
        self.call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}
