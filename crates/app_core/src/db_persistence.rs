//! SQLite-backed [`Persistence`] implementation
//!
//! Blocking database and filesystem work runs on tokio's blocking pool so
//! label writes for one batch proceed concurrently.

use crate::collection::{Item, Label, StoredLabel};
use crate::persistence::{ExportMode, ExportSummary, FolderSnapshot, Persistence};
use crate::{AppConfig, AppError};
use app_db::{session_id_for, SessionDb};
use async_trait::async_trait;
use directories::ProjectDirs;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff", "heic", "heif"];

const RAW_EXTENSIONS: &[&str] = &[
    "arw", "cr2", "cr3", "nef", "nrw", "orf", "raf", "rw2", "dng", "pef", "srw",
];

/// Check if a file is an image or RAW file the culler lists
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str()) || RAW_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List supported files in `folder` (non-recursive), sorted by filename
pub fn scan_folder(folder: &Path) -> Result<Vec<Item>, AppError> {
    if !folder.is_dir() {
        return Err(AppError::NotFound(folder.display().to_string()));
    }

    let mut items = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !is_supported_image(&path) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };

        let metadata = entry.metadata()?;
        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        items.push(Item::new(name, path, metadata.len(), modified_at));
    }

    items.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(items)
}

pub struct DbPersistence {
    db: SessionDb,
    cache_root: PathBuf,
    session_id: Arc<Mutex<Option<String>>>,
}

impl DbPersistence {
    pub fn new(db: SessionDb, cache_root: PathBuf) -> Self {
        Self {
            db,
            cache_root,
            session_id: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the database named by the config (or the default one)
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let db = app_db::init(config.storage.database_path.as_deref())?;
        let cache_root = ProjectDirs::from("com", "Glimpse", "Glimpse")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./cache"));
        Ok(Self::new(db, cache_root))
    }

    /// Underlying store, for maintenance
    pub fn db(&self) -> &SessionDb {
        &self.db
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn require_session(&self) -> Result<String, AppError> {
        self.session_id().ok_or(AppError::NoSession)
    }
}

#[async_trait]
impl Persistence for DbPersistence {
    async fn open_folder(&self, path: &Path) -> Result<FolderSnapshot, AppError> {
        let db = self.db.clone();
        let folder = path.to_path_buf();
        let cache_root = self.cache_root.clone();

        let (session_id, snapshot) = tokio::task::spawn_blocking(move || {
            let items = scan_folder(&folder)?;
            let folder_key = folder.to_string_lossy().replace('\\', "/");
            let session = db.upsert_session(&folder_key, items.len() as i64)?;

            let existing_labels = db
                .get_labels(&session.id)?
                .into_iter()
                .map(|record| StoredLabel {
                    label: record.label.as_deref().and_then(Label::parse),
                    id: record.filename,
                })
                .collect();

            let last_selected_index = usize::try_from(session.last_selected_index).ok();
            let cache_location = cache_root.join(&session.id);

            Ok::<_, AppError>((
                session.id,
                FolderSnapshot {
                    items,
                    existing_labels,
                    last_selected_index,
                    cache_location,
                },
            ))
        })
        .await??;

        tracing::info!(
            session = %session_id,
            items = snapshot.items.len(),
            labels = snapshot.existing_labels.len(),
            "Folder opened"
        );
        *self.session_id.lock() = Some(session_id);
        Ok(snapshot)
    }

    async fn set_label(&self, id: &str, label: Option<Label>) -> Result<(), AppError> {
        let session = self.require_session()?;
        let db = self.db.clone();
        let filename = id.to_string();

        tokio::task::spawn_blocking(move || {
            db.set_label(&session, &filename, label.map(Label::as_str))
        })
        .await??;
        Ok(())
    }

    async fn save_selected_index(&self, index: usize) -> Result<(), AppError> {
        let session = self.require_session()?;
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || db.update_last_selected(&session, index as i64)).await??;
        Ok(())
    }

    async fn export_selection(
        &self,
        source: &Path,
        dest: &Path,
        mode: ExportMode,
    ) -> Result<ExportSummary, AppError> {
        let session = self.require_session()?;
        let db = self.db.clone();
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();

        let summary = tokio::task::spawn_blocking(move || {
            let rejected: HashSet<String> = db.rejected_filenames(&session)?.into_iter().collect();
            let items = scan_folder(&source)?;
            std::fs::create_dir_all(&dest)?;

            let mut summary = ExportSummary { total: items.len(), ..ExportSummary::default() };
            for item in &items {
                if rejected.contains(&item.id) {
                    summary.skipped += 1;
                    continue;
                }
                match transfer(&item.path, &dest.join(&item.id), mode) {
                    Ok(()) => summary.copied += 1,
                    Err(e) => summary.errors.push(format!("{}: {}", item.id, e)),
                }
            }
            Ok::<_, AppError>(summary)
        })
        .await??;

        tracing::info!(
            copied = summary.copied,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            ?mode,
            "Export finished"
        );
        Ok(summary)
    }
}

fn transfer(src: &Path, dst: &Path, mode: ExportMode) -> std::io::Result<()> {
    match mode {
        ExportMode::Copy => std::fs::copy(src, dst).map(|_| ()),
        // rename fails across filesystems; fall back to copy + delete
        ExportMode::Move => std::fs::rename(src, dst).or_else(|_| {
            std::fs::copy(src, dst)?;
            std::fs::remove_file(src)
        }),
    }
}

/// Session id the store uses for `folder`
pub fn session_id_of(folder: &Path) -> String {
    session_id_for(&folder.to_string_lossy().replace('\\', "/"))
}
