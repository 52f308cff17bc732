//! SQLite session and label operations

use crate::{DbError, DbPool, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Session record (one per opened folder)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub folder_path: String,
    pub last_opened: Option<String>,
    pub last_selected_index: i64,
    pub total_files: i64,
    pub created_at: String,
}

/// Label record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    pub filename: String,
    pub label: Option<String>,
    pub updated_at: String,
}

/// Stable session id for a folder path
pub fn session_id_for(folder_path: &str) -> String {
    format!("{:016x}", xxh3_64(folder_path.as_bytes()))
}

/// Session database operations
#[derive(Clone)]
pub struct SessionDb {
    pool: DbPool,
}

impl SessionDb {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool.get().map_err(|e| DbError::Pool(e.to_string()))
    }

    // ===== Session Operations =====

    /// Create the session for a folder, or refresh `last_opened`/`total_files`
    pub fn upsert_session(&self, folder_path: &str, total_files: i64) -> Result<SessionRecord> {
        let conn = self.conn()?;
        let id = session_id_for(folder_path);
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO sessions (id, folder_path, last_opened, total_files, created_at)
            VALUES (?1, ?2, ?3, ?4, ?3)
            ON CONFLICT(id) DO UPDATE SET
                last_opened = excluded.last_opened,
                total_files = excluded.total_files
            "#,
            params![id, folder_path, now, total_files],
        )?;
        drop(conn);

        self.get_session(&id)?
            .ok_or_else(|| DbError::NotFound(format!("session {}", id)))
    }

    /// Get a session by id
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn()?;

        let record = conn
            .query_row(
                "SELECT id, folder_path, last_opened, last_selected_index, total_files, created_at
                 FROM sessions WHERE id = ?1",
                [session_id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        folder_path: row.get(1)?,
                        last_opened: row.get(2)?,
                        last_selected_index: row.get(3)?,
                        total_files: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    /// Persist the last selected position of a session
    pub fn update_last_selected(&self, session_id: &str, index: i64) -> Result<()> {
        let conn = self.conn()?;

        let rows = conn.execute(
            "UPDATE sessions SET last_selected_index = ?1, last_opened = ?2 WHERE id = ?3",
            params![index, Utc::now().to_rfc3339(), session_id],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }

    // ===== Label Operations =====

    /// Set (or clear, with `None`) the label of one file
    pub fn set_label(&self, session_id: &str, filename: &str, label: Option<&str>) -> Result<()> {
        let conn = self.conn()?;

        let exists: bool = conn
            .query_row("SELECT 1 FROM sessions WHERE id = ?1", [session_id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(DbError::NotFound(format!("session {}", session_id)));
        }

        conn.execute(
            r#"
            INSERT INTO labels (session_id, filename, label, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id, filename) DO UPDATE SET
                label = excluded.label,
                updated_at = excluded.updated_at
            "#,
            params![session_id, filename, label, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// All labels stored for a session
    pub fn get_labels(&self, session_id: &str) -> Result<Vec<LabelRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT filename, label, updated_at FROM labels WHERE session_id = ?1 ORDER BY filename",
        )?;

        let rows = stmt.query_map([session_id], |row| {
            Ok(LabelRecord {
                filename: row.get(0)?,
                label: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;

        let mut labels = Vec::new();
        for row in rows {
            labels.push(row?);
        }
        Ok(labels)
    }

    /// Filenames labelled `rejected` in a session
    pub fn rejected_filenames(&self, session_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT filename FROM labels WHERE session_id = ?1 AND label = 'rejected'",
        )?;
        let rows = stmt.query_map([session_id], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    // ===== Maintenance =====

    pub fn label_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM labels", [], |row| row.get(0))?)
    }

    pub fn session_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    /// Delete every label row, returning how many were removed
    pub fn clear_all_labels(&self) -> Result<i64> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM labels", [])?;
        tracing::info!("Cleared {} labels", rows);
        Ok(rows as i64)
    }

    /// Delete every session (labels cascade), returning how many were removed
    pub fn clear_all_sessions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM sessions", [])?;
        tracing::info!("Cleared {} sessions", rows);
        Ok(rows as i64)
    }
}
