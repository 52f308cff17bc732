//! Culling session: the boundary the presentation layer talks to
//!
//! Owns the collection, the derived filtered view, the selection, the view
//! mode and the grid window, and routes key presses through the navigation
//! controller. The filtered view is recomputed after every label batch and
//! filter change, and the selection is re-anchored onto it by item id.

use crate::collection::{Collection, FilterPredicate, FilteredView, Item, ItemId, Label, LabelCounts};
use crate::input::{Key, Modifiers};
use crate::metadata::{read_exif, ExifInfo};
use crate::navigation::{handle_key, NavCommand, NavContext};
use crate::persistence::{ExportMode, ExportSummary, FolderSnapshot, Persistence};
use crate::reconcile::{BatchResult, LabelEngine, PendingBatch, SharedCollection};
use crate::selection::{reduce, Selection, SelectionAction};
use crate::thumbnails::{ThumbnailEvent, ThumbnailProgress, ThumbnailSink};
use crate::view_mode::{ComparePair, ViewMode, ViewState};
use crate::window::VirtualWindow;
use crate::{AppConfig, AppError};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dialogs the host has to show on the session's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest {
    OpenFolder,
    Export,
}

/// What a key press did
#[derive(Debug)]
pub enum KeyOutcome {
    /// Unbound, blocked by a modal, or a no-op in this context
    Ignored,
    Handled,
    /// Labels changed optimistically; settle the batch and report back
    /// through [`CullSession::batch_settled`]
    Labeling(PendingBatch),
    Request(HostRequest),
}

impl KeyOutcome {
    fn labeling(pending: PendingBatch) -> Self {
        if pending.is_empty() {
            KeyOutcome::Ignored
        } else {
            KeyOutcome::Labeling(pending)
        }
    }
}

pub struct CullSession {
    config: AppConfig,
    persistence: Arc<dyn Persistence>,
    collection: SharedCollection,
    engine: LabelEngine,
    thumbnails: ThumbnailSink,
    filter: FilterPredicate,
    view: FilteredView,
    selection: Selection,
    view_state: ViewState,
    window: VirtualWindow,
    folder: Option<PathBuf>,
    cache_location: Option<PathBuf>,
    modal_active: bool,
    last_saved_index: Option<usize>,
}

impl CullSession {
    pub fn new(config: AppConfig, persistence: Arc<dyn Persistence>) -> Self {
        let collection: SharedCollection = Arc::new(RwLock::new(Collection::new()));
        let grid = &config.grid;
        let window = VirtualWindow::new(grid.columns, grid.row_height, grid.viewport_height, grid.overscan_rows);
        let filter = config.general.default_filter;
        let view = collection.read().filtered_view(filter);

        Self {
            engine: LabelEngine::new(collection.clone(), persistence.clone()),
            thumbnails: ThumbnailSink::new(collection.clone()),
            config,
            persistence,
            collection,
            filter,
            view,
            selection: Selection::default(),
            view_state: ViewState::default(),
            window,
            folder: None,
            cache_location: None,
            modal_active: false,
            last_saved_index: None,
        }
    }

    // ===== Loading =====

    /// Open a folder through persistence.
    ///
    /// On failure the session is left with an empty collection and the
    /// error is returned for display.
    pub async fn open_folder(&mut self, path: &Path) -> Result<(), AppError> {
        match self.persistence.open_folder(path).await {
            Ok(snapshot) => {
                self.load(snapshot);
                self.folder = Some(path.to_path_buf());
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to open folder");
                self.load(FolderSnapshot::default());
                Err(e)
            }
        }
    }

    /// Replace everything with a fresh snapshot
    pub fn load(&mut self, snapshot: FolderSnapshot) {
        let collection = Collection::load(snapshot.items, &snapshot.existing_labels);
        // Saved index is a collection position; translate it through the view
        let resume_id = snapshot
            .last_selected_index
            .and_then(|i| collection.get(i))
            .map(|item| item.id.clone());

        *self.collection.write() = collection;
        self.thumbnails.reset();
        self.view = self.collection.read().filtered_view(self.filter);

        let primary = resume_id.and_then(|id| self.view.position_of(&id));
        self.selection = Selection::reset(primary, self.view.len());
        self.last_saved_index = snapshot.last_selected_index;
        self.view_state = ViewState::default();
        self.folder = None;
        self.cache_location = Some(snapshot.cache_location).filter(|p| !p.as_os_str().is_empty());

        self.window.set_item_count(self.view.len());
        self.window.scroll_to(0.0);
        if let Some(primary) = self.selection.primary_index {
            self.window.scroll_into_view(primary);
        }

        tracing::info!(
            items = self.collection.read().len(),
            visible = self.view.len(),
            primary = ?self.selection.primary_index,
            "Collection loaded"
        );
    }

    // ===== Read access =====

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn cache_location(&self) -> Option<&Path> {
        self.cache_location.as_deref()
    }

    pub fn filtered_view(&self) -> &FilteredView {
        &self.view
    }

    pub fn filter(&self) -> FilterPredicate {
        self.filter
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_state.mode()
    }

    pub fn compare_pair(&self) -> Option<ComparePair> {
        self.view_state.compare()
    }

    pub fn window(&self) -> &VirtualWindow {
        &self.window
    }

    pub fn collection(&self) -> SharedCollection {
        self.collection.clone()
    }

    /// Item at a filtered index
    pub fn item(&self, index: usize) -> Option<Item> {
        let id = self.view.id_at(index)?;
        self.collection.read().get_by_id(id).cloned()
    }

    pub fn primary_item(&self) -> Option<Item> {
        self.selection.primary_index.and_then(|i| self.item(i))
    }

    pub fn label_counts(&self) -> LabelCounts {
        self.collection.read().counts()
    }

    pub fn is_modal_active(&self) -> bool {
        self.modal_active
    }

    // ===== Thumbnails =====

    pub fn thumbnail_progress(&self) -> ThumbnailProgress {
        self.thumbnails.progress()
    }

    /// Handle for a background task draining the thumbnail channel
    pub fn thumbnail_sink(&self) -> ThumbnailSink {
        self.thumbnails.clone()
    }

    pub fn apply_thumbnail_event(&self, event: ThumbnailEvent) -> usize {
        self.thumbnails.apply(event)
    }

    // ===== Selection =====

    pub fn select(&mut self, index: usize, modifiers: Modifiers) {
        self.apply_selection(SelectionAction::Click { index, modifiers });
    }

    pub fn clear_selection(&mut self) {
        self.apply_selection(SelectionAction::Clear);
    }

    fn move_cursor(&mut self, index: usize) {
        self.apply_selection(SelectionAction::MoveCursor(index));
    }

    fn apply_selection(&mut self, action: SelectionAction) {
        let next = reduce(&self.selection, action, self.view.len());
        if next == self.selection {
            return;
        }
        self.selection = next;

        if let Some(primary) = self.selection.primary_index {
            self.window.scroll_into_view(primary);
            self.remember_selection(primary);
        }
    }

    /// Fire-and-forget save of the primary item's collection index
    fn remember_selection(&mut self, filtered_index: usize) {
        if !self.config.general.remember_selection {
            return;
        }
        let Some(index) = self.view.collection_index(filtered_index) else {
            return;
        };
        if self.last_saved_index == Some(index) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(index, "No runtime, selected index not saved");
            return;
        };
        self.last_saved_index = Some(index);

        let persistence = self.persistence.clone();
        handle.spawn(async move {
            if let Err(e) = persistence.save_selected_index(index).await {
                tracing::warn!(index, error = %e, "Failed to save selected index");
            }
        });
    }

    /// Ids the label actions target: multi-select set ascending, or the primary
    fn target_ids(&self) -> Vec<ItemId> {
        self.selection
            .targets()
            .into_iter()
            .filter_map(|i| self.view.id_at(i).cloned())
            .collect()
    }

    /// Recompute the view and carry the selection over by id
    fn refresh_view(&mut self) {
        let anchored = self.selection.anchor(&self.view);
        self.view = self.collection.read().filtered_view(self.filter);
        self.selection = anchored.restore(&self.view);

        let len = self.view.len();
        self.window.set_item_count(len);
        self.view_state.revalidate(len);
        if let Some(primary) = self.selection.primary_index {
            self.window.scroll_into_view(primary);
        }
    }

    pub fn set_filter(&mut self, filter: FilterPredicate) {
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        self.refresh_view();
        tracing::debug!(?filter, visible = self.view.len(), "Filter changed");
    }

    // ===== Labels =====
    //
    // `begin_*` applies the optimistic change and refreshes the view right
    // away; the returned batch is settled by the host (possibly on another
    // task) and reported back through `batch_settled`. The async variants do
    // both steps in place.

    /// Toggle the current selection; the first target decides the new label
    pub fn begin_toggle_label(&mut self) -> PendingBatch {
        let ids = self.target_ids();
        let pending = self.engine.begin_toggle(&ids);
        self.refresh_view();
        pending
    }

    pub fn begin_batch_label(&mut self, ids: &[ItemId], label: Label) -> PendingBatch {
        let pending = self.engine.begin(ids, label);
        self.refresh_view();
        pending
    }

    pub fn begin_toggle_by_stable_id(&mut self, id: &str) -> PendingBatch {
        let pending = self.engine.begin_toggle_by_stable_id(id);
        self.refresh_view();
        pending
    }

    pub fn begin_mark_all_rejected(&mut self) -> PendingBatch {
        let pending = self.engine.begin(self.view.ids(), Label::Rejected);
        self.refresh_view();
        pending
    }

    pub fn begin_remove_all_rejected(&mut self) -> PendingBatch {
        let pending = self.engine.begin(self.view.ids(), Label::Adopted);
        self.refresh_view();
        pending
    }

    /// Pick up the rollbacks of a settled batch
    pub fn batch_settled(&mut self, result: &BatchResult) {
        self.refresh_view();
        if !result.success {
            tracing::info!(failed = result.failed_count, "Label batch partially rolled back");
        }
    }

    async fn settle(&mut self, pending: PendingBatch) -> BatchResult {
        let result = pending.settle().await;
        self.batch_settled(&result);
        result
    }

    pub async fn toggle_label(&mut self) -> BatchResult {
        let pending = self.begin_toggle_label();
        self.settle(pending).await
    }

    pub async fn batch_toggle_label(&mut self, ids: &[ItemId], label: Label) -> BatchResult {
        let pending = self.begin_batch_label(ids, label);
        self.settle(pending).await
    }

    pub async fn toggle_by_stable_id(&mut self, id: &str) -> BatchResult {
        let pending = self.begin_toggle_by_stable_id(id);
        self.settle(pending).await
    }

    pub async fn mark_all_rejected(&mut self) -> BatchResult {
        let pending = self.begin_mark_all_rejected();
        self.settle(pending).await
    }

    pub async fn remove_all_rejected(&mut self) -> BatchResult {
        let pending = self.begin_remove_all_rejected();
        self.settle(pending).await
    }

    // ===== View modes =====

    /// Switch modes; false when the view is too short for `mode`
    pub fn enter_view(&mut self, mode: ViewMode) -> bool {
        if !self.view_state.enter(mode, &self.selection, self.view.len()) {
            return false;
        }
        if matches!(mode, ViewMode::Detail | ViewMode::Gallery) && self.selection.primary_index.is_none() {
            self.move_cursor(0);
        }
        // Compare's left side is the cursor
        if let Some(pair) = self.view_state.compare() {
            self.move_cursor(pair.left);
        }
        tracing::debug!(?mode, "View mode entered");
        true
    }

    pub fn close_view(&mut self) {
        self.view_state.exit_to_grid();
    }

    fn move_compare(&mut self, left: Option<usize>, right: Option<usize>) {
        let Some(pair) = self.view_state.compare() else {
            return;
        };
        let next = ComparePair {
            left: left.unwrap_or(pair.left),
            right: right.unwrap_or(pair.right),
        };
        self.view_state.set_compare(next, self.view.len());
        if let Some(left) = left {
            self.move_cursor(left);
        }
    }

    fn toggle_compare_side(&mut self, right: bool) -> KeyOutcome {
        let Some(pair) = self.view_state.compare() else {
            return KeyOutcome::Ignored;
        };
        let index = if right { pair.right } else { pair.left };
        match self.view.id_at(index).cloned() {
            Some(id) => KeyOutcome::labeling(self.begin_toggle_by_stable_id(&id)),
            None => KeyOutcome::Ignored,
        }
    }

    // ===== Grid geometry =====

    pub fn set_columns(&mut self, columns: usize) {
        self.window.set_columns(columns);
    }

    /// Derive the column count from a viewport width
    pub fn set_viewport_width(&mut self, width: f32) {
        let columns = VirtualWindow::columns_for_width(width, self.config.grid.thumbnail_size as f32);
        self.window.set_columns(columns);
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.window.set_viewport_height(height);
    }

    /// Thumbnail size changed; rows are re-measured
    pub fn set_row_height(&mut self, row_height: f32) {
        self.window.set_row_height(row_height);
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.window.scroll_to(offset);
    }

    // ===== Keyboard =====

    /// A blocking dialog is open; key presses are dropped until it closes
    pub fn set_modal_active(&mut self, active: bool) {
        self.modal_active = active;
    }

    fn nav_context(&self) -> NavContext {
        NavContext {
            view_mode: self.view_state.mode(),
            columns: self.window.columns(),
            page_rows: self.config.grid.page_rows,
            len: self.view.len(),
            primary: self.selection.primary_index,
            compare: self.view_state.compare(),
            has_multi_select: self.selection.has_multi_select(),
            modal_active: self.modal_active,
        }
    }

    /// Resolve and apply a key press. Label keys return the pending batch
    /// with the optimistic change already visible.
    pub fn handle_key(&mut self, key: Key, modifiers: Modifiers) -> KeyOutcome {
        let command = handle_key(key, modifiers, &self.nav_context());
        tracing::trace!(?key, ?command, "Key resolved");

        match command {
            NavCommand::None => KeyOutcome::Ignored,
            NavCommand::MoveTo(index) => {
                self.move_cursor(index);
                KeyOutcome::Handled
            }
            NavCommand::EnterView(mode) => {
                if self.enter_view(mode) {
                    KeyOutcome::Handled
                } else {
                    KeyOutcome::Ignored
                }
            }
            NavCommand::ExitToGrid => {
                self.close_view();
                KeyOutcome::Handled
            }
            NavCommand::ToggleLabel => KeyOutcome::labeling(self.begin_toggle_label()),
            NavCommand::MoveCompareLeft(index) => {
                self.move_compare(Some(index), None);
                KeyOutcome::Handled
            }
            NavCommand::MoveCompareRight(index) => {
                self.move_compare(None, Some(index));
                KeyOutcome::Handled
            }
            NavCommand::ToggleCompareLeft => self.toggle_compare_side(false),
            NavCommand::ToggleCompareRight => self.toggle_compare_side(true),
            NavCommand::ClearMultiSelect => {
                self.clear_selection();
                KeyOutcome::Handled
            }
            NavCommand::OpenFolder => KeyOutcome::Request(HostRequest::OpenFolder),
            NavCommand::Export => KeyOutcome::Request(HostRequest::Export),
        }
    }

    // ===== Export =====

    /// Copy or move every non-rejected file of the open folder into `dest`
    pub async fn export(&self, dest: &Path, mode: ExportMode) -> Result<ExportSummary, AppError> {
        let source = self.folder.as_deref().ok_or(AppError::NoSession)?;
        self.persistence.export_selection(source, dest, mode).await
    }

    // ===== Metadata =====

    /// EXIF of the primary item, `None` with no primary
    pub async fn primary_exif(&self) -> Result<Option<ExifInfo>, AppError> {
        let Some(item) = self.primary_item() else {
            return Ok(None);
        };
        let info = tokio::task::spawn_blocking(move || read_exif(&item.path)).await??;
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::StoredLabel;
    use crate::test_support::MockPersistence;
    use crate::thumbnails::ThumbnailOutcome;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn snapshot(count: usize) -> FolderSnapshot {
        let items = (0..count)
            .map(|i| {
                let name = format!("img_{:02}.jpg", i);
                Item::new(name.clone(), format!("/photos/{}", name), 1024, None)
            })
            .collect();
        FolderSnapshot { items, ..FolderSnapshot::default() }
    }

    fn named(names: &[&str]) -> FolderSnapshot {
        let items = names.iter().map(|n| Item::new(*n, *n, 0, None)).collect();
        FolderSnapshot { items, ..FolderSnapshot::default() }
    }

    async fn session_with(mock: MockPersistence) -> (CullSession, Arc<MockPersistence>) {
        let mock = Arc::new(mock);
        let mut session = CullSession::new(AppConfig::default(), mock.clone());
        session.open_folder(Path::new("/photos")).await.unwrap();
        (session, mock)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn ids(names: &[&str]) -> Vec<ItemId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_toggle_at_index_two_flips_and_back() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(5))).await;
        session.select(2, Modifiers::NONE);

        let first = session.toggle_label().await;
        assert!(first.success);
        assert_eq!(session.item(2).unwrap().label, Label::Rejected);
        assert_eq!(session.label_counts().rejected, 1);

        session.toggle_label().await;
        assert_eq!(session.item(2).unwrap().label, Label::Adopted);
    }

    #[tokio::test]
    async fn test_batch_with_one_failure() {
        let mock = MockPersistence::new()
            .with_snapshot(named(&["a.jpg", "b.jpg", "c.jpg"]))
            .failing(["b.jpg"]);
        let (mut session, _) = session_with(mock).await;

        let result = session
            .batch_toggle_label(&ids(&["a.jpg", "b.jpg", "c.jpg"]), Label::Rejected)
            .await;

        assert_eq!(
            result,
            BatchResult {
                success: false,
                success_count: 2,
                failed_count: 1,
                failed_ids: ids(&["b.jpg"]),
            }
        );
        assert_eq!(session.item(0).unwrap().label, Label::Rejected);
        assert_eq!(session.item(1).unwrap().label, Label::Adopted);
        assert_eq!(session.item(2).unwrap().label, Label::Rejected);
    }

    #[tokio::test]
    async fn test_arrow_down_past_last_row_jumps_to_last() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(20))).await;
        session.select(18, Modifiers::NONE);

        let outcome = session.handle_key(Key::ArrowDown, Modifiers::NONE);
        assert!(matches!(outcome, KeyOutcome::Handled));
        assert_eq!(session.selection().primary_index, Some(19));
    }

    #[tokio::test]
    async fn test_arrow_up_same_column() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(20))).await;
        session.select(5, Modifiers::NONE);

        session.handle_key(Key::ArrowUp, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(1));
    }

    #[tokio::test]
    async fn test_home_end() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(20))).await;
        session.select(7, Modifiers::NONE);

        session.handle_key(Key::End, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(19));
        session.handle_key(Key::Home, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(0));
    }

    #[tokio::test]
    async fn test_key_movement_keeps_multi_select() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(10))).await;
        session.select(1, Modifiers::NONE);
        session.select(3, Modifiers::CTRL);

        session.handle_key(Key::ArrowRight, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(4));
        assert_eq!(session.selection().multi_select, BTreeSet::from([1, 3]));
    }

    #[tokio::test]
    async fn test_zero_match_filter() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(5))).await;
        session.select(3, Modifiers::NONE);

        session.set_filter(FilterPredicate::RejectedOnly);
        assert!(session.filtered_view().is_empty());
        assert_eq!(session.selection().primary_index, None);

        session.select(0, Modifiers::NONE);
        assert_eq!(session.selection(), &Selection::default());
        assert!(!session.enter_view(ViewMode::Detail));
        assert_eq!(session.window().row_count(), 0);
    }

    #[tokio::test]
    async fn test_label_change_reanchors_multi_select_by_id() {
        let mut snap = named(&["a", "b", "c", "d", "e"]);
        snap.existing_labels = vec![StoredLabel { id: "a".into(), label: None }];
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snap)).await;
        session.set_filter(FilterPredicate::AdoptedOnly);

        session.select(1, Modifiers::NONE);
        session.select(3, Modifiers::CTRL);
        session.toggle_by_stable_id("c").await;

        // view is now [a, b, d, e]; b and d keep their membership and the
        // cursor stays on d
        assert_eq!(session.filtered_view().ids(), &ids(&["a", "b", "d", "e"])[..]);
        assert_eq!(session.selection().multi_select, BTreeSet::from([1, 2]));
        assert_eq!(session.selection().primary_index, Some(2));
        assert_eq!(session.primary_item().unwrap().id, "d");
    }

    #[tokio::test]
    async fn test_selected_index_saved_fire_and_forget() {
        let (mut session, mock) = session_with(MockPersistence::new().with_snapshot(snapshot(5))).await;

        session.select(2, Modifiers::NONE);
        session.select(2, Modifiers::NONE);
        settle().await;

        assert_eq!(mock.saved_indices(), vec![2]);
    }

    #[tokio::test]
    async fn test_saved_index_is_collection_position() {
        let mut snap = named(&["a", "b", "c", "d"]);
        snap.existing_labels = vec![StoredLabel { id: "b".into(), label: Some(Label::Rejected) }];
        let (mut session, mock) = session_with(MockPersistence::new().with_snapshot(snap)).await;
        session.set_filter(FilterPredicate::AdoptedOnly);

        // filtered index 1 is "c", collection index 2
        session.select(1, Modifiers::NONE);
        settle().await;
        assert_eq!(mock.saved_indices(), vec![2]);
    }

    #[tokio::test]
    async fn test_failed_save_does_not_block_navigation() {
        let mock = MockPersistence::new().with_snapshot(snapshot(5)).failing_save();
        let (mut session, mock) = session_with(mock).await;

        session.select(1, Modifiers::NONE);
        settle().await;
        session.handle_key(Key::ArrowRight, Modifiers::NONE);
        settle().await;

        assert_eq!(session.selection().primary_index, Some(2));
        assert_eq!(mock.saved_indices(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_remember_selection_off() {
        let mock = Arc::new(MockPersistence::new().with_snapshot(snapshot(5)));
        let mut config = AppConfig::default();
        config.general.remember_selection = false;
        let mut session = CullSession::new(config, mock.clone());
        session.open_folder(Path::new("/photos")).await.unwrap();

        session.select(3, Modifiers::NONE);
        settle().await;
        assert!(mock.saved_indices().is_empty());
    }

    #[tokio::test]
    async fn test_resume_from_saved_index() {
        let mut snap = snapshot(30);
        snap.last_selected_index = Some(25);
        let (session, _) = session_with(MockPersistence::new().with_snapshot(snap)).await;

        assert_eq!(session.selection().primary_index, Some(25));
        assert!(session.window().visible_rows().contains(&session.window().row_of(25)));
    }

    #[tokio::test]
    async fn test_failed_open_leaves_empty_collection() {
        let mock = Arc::new(MockPersistence::new().failing_open());
        let mut session = CullSession::new(AppConfig::default(), mock);
        session.load(snapshot(3));
        assert_eq!(session.filtered_view().len(), 3);

        let result = session.open_folder(Path::new("/missing")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(session.filtered_view().is_empty());
        assert_eq!(session.label_counts().total, 0);
        assert!(session.folder().is_none());
        assert!(matches!(
            session.export(Path::new("/out"), ExportMode::Copy).await,
            Err(AppError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_thumbnail_merge_by_id_under_filter() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(named(&["a", "b", "c"]))).await;
        session.select(0, Modifiers::NONE);
        session.toggle_label().await;
        session.set_filter(FilterPredicate::AdoptedOnly);

        let applied = session.apply_thumbnail_event(ThumbnailEvent::Complete(vec![
            ThumbnailOutcome { id: "c".into(), success: true, thumbnail_ref: Some("c.webp".into()) },
            ThumbnailOutcome { id: "zz".into(), success: true, thumbnail_ref: None },
        ]));
        assert_eq!(applied, 1);

        // "c" is filtered index 1 now
        let c = session.item(1).unwrap();
        assert_eq!(c.id, "c");
        assert!(c.thumbnail_ready);
        assert!(!session.item(0).unwrap().thumbnail_ready);

        session.apply_thumbnail_event(ThumbnailEvent::Progress(ThumbnailProgress { completed: 1, total: 3 }));
        assert_eq!(session.thumbnail_progress().completed, 1);
    }

    #[tokio::test]
    async fn test_compare_keys() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(named(&["a", "b", "c", "d"]))).await;
        session.select(1, Modifiers::NONE);
        session.select(3, Modifiers::CTRL);

        assert!(matches!(session.handle_key(Key::Char('c'), Modifiers::NONE), KeyOutcome::Handled));
        assert_eq!(session.view_mode(), ViewMode::Compare);
        assert_eq!(session.compare_pair(), Some(ComparePair { left: 1, right: 3 }));
        assert_eq!(session.selection().primary_index, Some(1));

        let KeyOutcome::Labeling(pending) = session.handle_key(Key::Char('2'), Modifiers::NONE) else {
            panic!("expected a label batch");
        };
        let result = pending.settle().await;
        session.batch_settled(&result);
        assert_eq!(result.success_count, 1);
        assert_eq!(session.item(3).unwrap().label, Label::Rejected);
        assert_eq!(session.item(1).unwrap().label, Label::Adopted);

        session.handle_key(Key::ArrowLeft, Modifiers::SHIFT);
        assert_eq!(session.compare_pair(), Some(ComparePair { left: 1, right: 2 }));
        session.handle_key(Key::ArrowRight, Modifiers::NONE);
        assert_eq!(session.compare_pair(), Some(ComparePair { left: 2, right: 2 }));
        assert_eq!(session.selection().primary_index, Some(2));

        session.handle_key(Key::Escape, Modifiers::NONE);
        assert_eq!(session.view_mode(), ViewMode::Grid);
    }

    #[tokio::test]
    async fn test_compare_needs_two_items() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(named(&["a"]))).await;
        assert!(matches!(session.handle_key(Key::Char('c'), Modifiers::NONE), KeyOutcome::Ignored));
        assert_eq!(session.view_mode(), ViewMode::Grid);
    }

    #[tokio::test]
    async fn test_detail_entry_selects_first() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(3))).await;
        assert_eq!(session.selection().primary_index, None);

        session.handle_key(Key::Enter, Modifiers::NONE);
        assert_eq!(session.view_mode(), ViewMode::Detail);
        assert_eq!(session.selection().primary_index, Some(0));
    }

    #[tokio::test]
    async fn test_gallery_escape_clears_multi_select_only() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(4))).await;
        session.select(0, Modifiers::NONE);
        session.select(2, Modifiers::CTRL);
        session.enter_view(ViewMode::Gallery);

        assert!(matches!(session.handle_key(Key::Escape, Modifiers::NONE), KeyOutcome::Handled));
        assert!(!session.selection().has_multi_select());
        assert_eq!(session.selection().primary_index, Some(2));

        assert!(matches!(session.handle_key(Key::Escape, Modifiers::NONE), KeyOutcome::Ignored));
        assert_eq!(session.view_mode(), ViewMode::Gallery);
    }

    #[tokio::test]
    async fn test_rejected_filter_exits_compare_when_too_short() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(named(&["a", "b", "c"]))).await;
        session.mark_all_rejected().await;
        session.set_filter(FilterPredicate::RejectedOnly);
        session.select(0, Modifiers::NONE);
        assert!(session.enter_view(ViewMode::Compare));

        session.toggle_by_stable_id("a").await;
        session.toggle_by_stable_id("b").await;
        assert_eq!(session.filtered_view().len(), 1);
        assert_eq!(session.view_mode(), ViewMode::Grid);

        let result = session.remove_all_rejected().await;
        assert_eq!(result.success_count, 1);
        assert!(session.filtered_view().is_empty());
    }

    #[tokio::test]
    async fn test_modal_blocks_keys_and_host_requests() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(3))).await;
        session.select(0, Modifiers::NONE);

        assert!(matches!(session.handle_key(Key::Char('e'), Modifiers::CTRL), KeyOutcome::Request(HostRequest::Export)));

        session.set_modal_active(true);
        assert!(matches!(session.handle_key(Key::ArrowRight, Modifiers::NONE), KeyOutcome::Ignored));
        assert_eq!(session.selection().primary_index, Some(0));

        session.set_modal_active(false);
        session.handle_key(Key::ArrowRight, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(1));
    }

    #[tokio::test]
    async fn test_export_uses_open_folder() {
        let (session, mock) = session_with(MockPersistence::new().with_snapshot(snapshot(2))).await;
        session.export(Path::new("/out"), ExportMode::Move).await.unwrap();
        assert_eq!(mock.exports(), vec![ExportMode::Move]);
    }

    #[tokio::test]
    async fn test_primary_exif() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(2))).await;
        assert_eq!(session.primary_exif().await.unwrap(), None);

        // the snapshot paths do not exist on disk
        session.select(0, Modifiers::NONE);
        let err = session.primary_exif().await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_viewport_width_sets_columns() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(20))).await;
        session.set_viewport_width(1000.0);
        assert_eq!(session.window().columns(), 3);

        session.select(10, Modifiers::NONE);
        session.handle_key(Key::ArrowUp, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_label_visible_while_batch_pending() {
        let mock = MockPersistence::new()
            .with_snapshot(named(&["a", "b", "c"]))
            .with_delay("b", Duration::from_millis(50))
            .failing(["b"]);
        let (mut session, _) = session_with(mock).await;
        session.set_filter(FilterPredicate::AdoptedOnly);
        session.select(1, Modifiers::NONE);

        let KeyOutcome::Labeling(pending) = session.handle_key(Key::Char('1'), Modifiers::NONE) else {
            panic!("expected a label batch");
        };
        // b left the adopted view before persistence answered
        assert_eq!(session.filtered_view().ids(), &ids(&["a", "c"])[..]);
        assert_eq!(session.label_counts().rejected, 1);

        // navigation keeps working while the write is in flight
        let settling = tokio::spawn(pending.settle());
        session.handle_key(Key::Home, Modifiers::NONE);
        assert_eq!(session.selection().primary_index, Some(0));

        let result = settling.await.unwrap();
        session.batch_settled(&result);
        assert_eq!(result.failed_ids, ids(&["b"]));
        assert_eq!(session.filtered_view().ids(), &ids(&["a", "b", "c"])[..]);
        assert_eq!(session.primary_item().unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_empty_selection_label_key_ignored() {
        let (mut session, mock) = session_with(MockPersistence::new().with_snapshot(snapshot(3))).await;
        assert!(matches!(session.handle_key(Key::Char('1'), Modifiers::NONE), KeyOutcome::Ignored));
        assert!(mock.label_calls().is_empty());
    }

    #[tokio::test]
    async fn test_row_height_change_remeasures() {
        let (mut session, _) = session_with(MockPersistence::new().with_snapshot(snapshot(40))).await;
        session.set_viewport_height(220.0);
        session.scroll_to(660.0);
        assert_eq!(session.window().visible_rows().start, 3);

        session.set_row_height(110.0);
        assert_eq!(session.window().row_height(), 110.0);
        assert_eq!(session.window().content_height(), 1100.0);
        // first visible item (12) stays at the top
        assert_eq!(session.window().scroll_offset(), 330.0);
        assert_eq!(session.window().visible_rows().start, 3);
    }
}
