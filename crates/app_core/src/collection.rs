//! Ordered photo collection and the filtered view derived from it

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Stable item identifier (the filename). Durable references use this, never an index.
pub type ItemId = String;

/// Culling label. Unlabeled items count as adopted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Adopted,
    Rejected,
}

impl Label {
    pub fn inverted(self) -> Self {
        match self {
            Label::Adopted => Label::Rejected,
            Label::Rejected => Label::Adopted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Adopted => "adopted",
            Label::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "adopted" => Some(Label::Adopted),
            "rejected" => Some(Label::Rejected),
            _ => None,
        }
    }
}

/// One photo in the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Unix seconds
    pub modified_at: Option<i64>,
    pub label: Label,
    pub thumbnail_ready: bool,
    pub thumbnail_ref: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, path: impl Into<PathBuf>, size_bytes: u64, modified_at: Option<i64>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            size_bytes,
            modified_at,
            label: Label::default(),
            thumbnail_ready: false,
            thumbnail_ref: None,
        }
    }
}

/// A label previously stored for an item; `None` means explicitly unlabeled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLabel {
    pub id: ItemId,
    pub label: Option<Label>,
}

/// Filter predicate for the view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPredicate {
    #[default]
    All,
    AdoptedOnly,
    RejectedOnly,
}

impl FilterPredicate {
    pub fn matches(self, label: Label) -> bool {
        match self {
            FilterPredicate::All => true,
            FilterPredicate::AdoptedOnly => label == Label::Adopted,
            FilterPredicate::RejectedOnly => label == Label::Rejected,
        }
    }
}

/// Label tallies over the whole collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub total: usize,
    pub adopted: usize,
    pub rejected: usize,
}

/// Index-addressed arena of items in scan order.
///
/// Never reordered; replaced wholesale on folder open.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    items: Vec<Item>,
    index_by_id: HashMap<ItemId, usize>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh collection from a folder listing and its stored labels
    pub fn load(items: Vec<Item>, existing_labels: &[StoredLabel]) -> Self {
        let mut collection = Collection {
            items: Vec::with_capacity(items.len()),
            index_by_id: HashMap::with_capacity(items.len()),
        };

        for item in items {
            if collection.index_by_id.contains_key(&item.id) {
                tracing::warn!(id = %item.id, "Duplicate item id in folder listing, keeping first");
                continue;
            }
            collection.index_by_id.insert(item.id.clone(), collection.items.len());
            collection.items.push(item);
        }

        for stored in existing_labels {
            if !collection.set_label(&stored.id, stored.label.unwrap_or_default()) {
                tracing::debug!(id = %stored.id, "Stored label for missing file ignored");
            }
        }

        collection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Item> {
        self.position(id).map(|i| &self.items[i])
    }

    pub fn label_of(&self, id: &str) -> Option<Label> {
        self.get_by_id(id).map(|item| item.label)
    }

    /// Set an item's label; returns false for unknown ids
    pub fn set_label(&mut self, id: &str, label: Label) -> bool {
        match self.index_by_id.get(id) {
            Some(&i) => {
                self.items[i].label = label;
                true
            }
            None => false,
        }
    }

    /// Record thumbnail completion for an item; returns false for unknown ids
    pub fn set_thumbnail(&mut self, id: &str, ready: bool, thumbnail_ref: Option<String>) -> bool {
        match self.index_by_id.get(id) {
            Some(&i) => {
                let item = &mut self.items[i];
                item.thumbnail_ready = ready;
                if thumbnail_ref.is_some() || !ready {
                    item.thumbnail_ref = thumbnail_ref;
                }
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> LabelCounts {
        let rejected = self.items.iter().filter(|i| i.label == Label::Rejected).count();
        LabelCounts {
            total: self.items.len(),
            adopted: self.items.len() - rejected,
            rejected,
        }
    }

    /// Derive the ordered subsequence matching `predicate`. O(n).
    pub fn filtered_view(&self, predicate: FilterPredicate) -> FilteredView {
        let mut indices = Vec::new();
        let mut ids = Vec::new();
        let mut positions = HashMap::new();
        for (i, item) in self.items.iter().enumerate() {
            if predicate.matches(item.label) {
                positions.insert(item.id.clone(), ids.len());
                indices.push(i);
                ids.push(item.id.clone());
            }
        }
        FilteredView { predicate, indices, ids, positions }
    }
}

/// Order-preserving projection of the collection.
///
/// Positions in here are filtered indices: volatile, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    predicate: FilterPredicate,
    indices: Vec<usize>,
    ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
}

impl FilteredView {
    pub fn predicate(&self) -> FilterPredicate {
        self.predicate
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Collection index of the item at filtered position `i`
    pub fn collection_index(&self, i: usize) -> Option<usize> {
        self.indices.get(i).copied()
    }

    pub fn id_at(&self, i: usize) -> Option<&ItemId> {
        self.ids.get(i)
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Filtered position of an id, if it is visible
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }
}
