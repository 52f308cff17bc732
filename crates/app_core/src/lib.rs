//! Glimpse Core Domain Logic
//!
//! This crate contains:
//! - Collection and filtered view
//! - Selection state machine
//! - Label reconciliation against persistence
//! - Keyboard navigation and view modes
//! - Virtualized grid window
//! - EXIF metadata for the detail panel
//! - Configuration and error types

pub mod collection;
pub mod config;
pub mod db_persistence;
pub mod error;
pub mod input;
pub mod metadata;
pub mod navigation;
pub mod persistence;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod thumbnails;
pub mod view_mode;
pub mod window;

#[cfg(test)]
mod test_support;

pub use collection::{Collection, FilterPredicate, FilteredView, Item, ItemId, Label, LabelCounts, StoredLabel};
pub use config::{AppConfig, GeneralConfig, GridConfig, StorageConfig, ThumbnailConfig};
pub use db_persistence::{is_supported_image, scan_folder, DbPersistence};
pub use error::AppError;
pub use input::{Key, KeyChord, Modifiers, ParseKeyError};
pub use metadata::{read_exif, ExifInfo};
pub use navigation::{handle_key, NavCommand, NavContext};
pub use persistence::{ExportMode, ExportSummary, FolderSnapshot, Persistence};
pub use reconcile::{BatchResult, LabelEngine, PendingBatch, SharedCollection};
pub use selection::{reduce, Selection, SelectionAction};
pub use session::{CullSession, HostRequest, KeyOutcome};
pub use thumbnails::{ThumbnailEvent, ThumbnailOutcome, ThumbnailProgress, ThumbnailSink};
pub use view_mode::{ComparePair, ViewMode, ViewState};
pub use window::VirtualWindow;
