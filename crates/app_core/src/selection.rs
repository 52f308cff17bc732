//! Selection state machine over filtered-view indices
//!
//! Every transition is a pure `(state, action) -> state` reduction; the
//! caller supplies the current view length. Out-of-range indices leave the
//! state untouched.

use crate::collection::{FilteredView, ItemId};
use crate::input::Modifiers;
use std::collections::BTreeSet;

/// Primary cursor plus multi-select set. All indices are filtered-view positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub primary_index: Option<usize>,
    pub multi_select: BTreeSet<usize>,
    pub last_anchor: Option<usize>,
}

/// Selection transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAction {
    /// Mouse click with the modifiers held at the time
    Click { index: usize, modifiers: Modifiers },
    /// Keyboard cursor movement; the multi-select set is left alone
    MoveCursor(usize),
    /// Drop the multi-select set, keep the cursor
    Clear,
}

impl Selection {
    /// Fresh selection for a newly loaded view
    pub fn reset(primary: Option<usize>, len: usize) -> Self {
        Self {
            primary_index: primary.filter(|&i| i < len),
            multi_select: BTreeSet::new(),
            last_anchor: None,
        }
    }

    pub fn has_multi_select(&self) -> bool {
        !self.multi_select.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.multi_select.contains(&index)
    }

    /// Indices a label action applies to: the multi-select set in ascending
    /// order, or the primary index alone.
    pub fn targets(&self) -> Vec<usize> {
        if self.multi_select.is_empty() {
            self.primary_index.into_iter().collect()
        } else {
            self.multi_select.iter().copied().collect()
        }
    }

    /// Capture the selection by item id so it survives a view recomputation
    pub fn anchor(&self, view: &FilteredView) -> AnchoredSelection {
        AnchoredSelection {
            primary_index: self.primary_index,
            primary_id: self.primary_index.and_then(|i| view.id_at(i).cloned()),
            multi_ids: self
                .multi_select
                .iter()
                .filter_map(|&i| view.id_at(i).cloned())
                .collect(),
        }
    }
}

/// Selection detached from filtered indices, see [`Selection::anchor`]
#[derive(Debug, Clone, Default)]
pub struct AnchoredSelection {
    primary_index: Option<usize>,
    primary_id: Option<ItemId>,
    multi_ids: Vec<ItemId>,
}

impl AnchoredSelection {
    /// Re-attach to a recomputed view.
    ///
    /// Entries follow their item; multi-select entries whose item left the
    /// view are dropped. A primary whose item left the view keeps its old
    /// position clamped to `len - 1`.
    pub fn restore(self, view: &FilteredView) -> Selection {
        let len = view.len();
        let followed = self.primary_id.as_deref().and_then(|id| view.position_of(id));
        let primary_index = match (followed, self.primary_index) {
            (Some(i), _) => Some(i),
            _ if len == 0 => None,
            (None, Some(i)) => Some(i.min(len - 1)),
            (None, None) => None,
        };
        let multi_select = self
            .multi_ids
            .iter()
            .filter_map(|id| view.position_of(id))
            .collect();

        Selection {
            primary_index,
            multi_select,
            last_anchor: primary_index,
        }
    }
}

/// Apply one transition
pub fn reduce(state: &Selection, action: SelectionAction, len: usize) -> Selection {
    match action {
        SelectionAction::Click { index, .. } | SelectionAction::MoveCursor(index) if index >= len => {
            tracing::debug!(index, len, "Selection index out of range, ignored");
            state.clone()
        }
        SelectionAction::Click { index, modifiers } => click(state, index, modifiers),
        SelectionAction::MoveCursor(index) => Selection {
            primary_index: Some(index),
            multi_select: state.multi_select.clone(),
            last_anchor: Some(index),
        },
        SelectionAction::Clear => Selection {
            primary_index: state.primary_index,
            multi_select: BTreeSet::new(),
            last_anchor: state.last_anchor,
        },
    }
}

fn click(state: &Selection, index: usize, modifiers: Modifiers) -> Selection {
    if modifiers.command() {
        let mut multi_select = state.multi_select.clone();
        if !multi_select.remove(&index) {
            multi_select.insert(index);
        }
        return Selection {
            primary_index: Some(index),
            multi_select,
            last_anchor: Some(index),
        };
    }

    if modifiers.shift && !state.multi_select.is_empty() {
        if let Some(from) = state.primary_index {
            let (lo, hi) = (from.min(index), from.max(index));
            return Selection {
                primary_index: Some(index),
                multi_select: (lo..=hi).collect(),
                last_anchor: state.last_anchor,
            };
        }
    }

    Selection {
        primary_index: Some(index),
        multi_select: BTreeSet::from([index]),
        last_anchor: Some(index),
    }
}
