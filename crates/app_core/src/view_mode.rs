//! Presentation modes and their entry preconditions

use crate::selection::Selection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    /// Single item, large
    Detail,
    /// Two items side by side
    Compare,
    /// Filmstrip
    Gallery,
}

impl ViewMode {
    /// Minimum filtered-view length required to enter this mode
    pub fn min_items(self) -> usize {
        match self {
            ViewMode::Grid => 0,
            ViewMode::Detail | ViewMode::Gallery => 1,
            ViewMode::Compare => 2,
        }
    }
}

/// Left/right filtered indices shown in Compare mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparePair {
    pub left: usize,
    pub right: usize,
}

impl ComparePair {
    /// Pair for entering Compare: the two lowest multi-selected indices, else
    /// the primary and its successor (wrapping to 0 after the last item).
    pub fn for_selection(selection: &Selection, len: usize) -> Option<Self> {
        if len < 2 {
            return None;
        }

        let mut picked = selection.multi_select.iter().copied().filter(|&i| i < len);
        if selection.multi_select.len() >= 2 {
            if let (Some(left), Some(right)) = (picked.next(), picked.next()) {
                return Some(Self { left, right });
            }
        }

        let left = selection.primary_index.filter(|&i| i < len).unwrap_or(0);
        let right = if left + 1 >= len { 0 } else { left + 1 };
        Some(Self { left, right })
    }

    fn clamp(self, len: usize) -> Self {
        let max = len.saturating_sub(1);
        Self { left: self.left.min(max), right: self.right.min(max) }
    }
}

/// Current mode plus mode-specific state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    mode: ViewMode,
    compare: Option<ComparePair>,
}

impl ViewState {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn compare(&self) -> Option<ComparePair> {
        self.compare
    }

    /// Try to switch modes. Returns false (and stays put) when the view is
    /// too short for `mode`.
    pub fn enter(&mut self, mode: ViewMode, selection: &Selection, len: usize) -> bool {
        if len < mode.min_items() {
            tracing::debug!(?mode, len, "View mode precondition not met, ignored");
            return false;
        }

        self.compare = match mode {
            ViewMode::Compare => ComparePair::for_selection(selection, len),
            _ => None,
        };
        self.mode = mode;
        true
    }

    pub fn exit_to_grid(&mut self) {
        self.mode = ViewMode::Grid;
        self.compare = None;
    }

    /// Set the compare pair; both sides are clamped to the view
    pub fn set_compare(&mut self, pair: ComparePair, len: usize) {
        if self.mode == ViewMode::Compare && len >= 2 {
            self.compare = Some(pair.clamp(len));
        }
    }

    /// Re-check preconditions after the filtered view changed length
    pub fn revalidate(&mut self, len: usize) {
        if len < self.mode.min_items() {
            tracing::debug!(mode = ?self.mode, len, "View too short for mode, back to grid");
            self.exit_to_grid();
            return;
        }
        self.compare = self.compare.map(|pair| pair.clamp(len));
    }
}
