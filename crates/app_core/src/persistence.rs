//! Persistence contract the core depends on
//!
//! The core never touches the filesystem or database directly; everything
//! durable goes through [`Persistence`]. Every call is independent and may
//! complete in any order.

use crate::collection::{Item, Label, StoredLabel};
use crate::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result of opening a folder
#[derive(Debug, Clone, Default)]
pub struct FolderSnapshot {
    /// Items in scan order
    pub items: Vec<Item>,
    pub existing_labels: Vec<StoredLabel>,
    /// Collection index saved by the previous visit
    pub last_selected_index: Option<usize>,
    pub cache_location: PathBuf,
}

/// Export transfer mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Copy,
    Move,
}

/// Outcome of an export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub copied: usize,
    pub total: usize,
    /// Rejected files left behind
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Scan a folder and load what was remembered about it
    async fn open_folder(&self, path: &Path) -> Result<FolderSnapshot, AppError>;

    /// Durably record one item's label (`None` clears it)
    async fn set_label(&self, id: &str, label: Option<Label>) -> Result<(), AppError>;

    /// Remember the cursor position for the next visit
    async fn save_selected_index(&self, index: usize) -> Result<(), AppError>;

    /// Copy or move every non-rejected file from `source` into `dest`
    async fn export_selection(
        &self,
        source: &Path,
        dest: &Path,
        mode: ExportMode,
    ) -> Result<ExportSummary, AppError>;
}
