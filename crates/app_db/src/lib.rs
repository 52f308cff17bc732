//! Glimpse Database Layer
//!
//! SQLite storage for culling sessions: one session per folder, one label
//! row per file, plus the last selected position.

mod sqlite;
mod schema;
mod pool;

pub use sqlite::{SessionDb, SessionRecord, LabelRecord, session_id_for};
pub use pool::{DbPool, init_pool};
pub use schema::migrate;

use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Get the database directory
pub fn db_dir() -> PathBuf {
    ProjectDirs::from("com", "Glimpse", "Glimpse")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Open (creating and migrating if needed) the session database.
///
/// `path` overrides the default `<data dir>/glimpse.db`.
pub fn init(path: Option<&Path>) -> Result<SessionDb> {
    let db_path = match path {
        Some(p) => p.to_path_buf(),
        None => db_dir().join("glimpse.db"),
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = init_pool(&db_path)?;
    migrate(&pool)?;

    tracing::info!("Database initialized at {:?}", db_path);
    Ok(SessionDb::new(pool))
}
