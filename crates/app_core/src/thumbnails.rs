//! Thumbnail readiness events merged into the collection
//!
//! Events arrive on their own channel, independent of label batches, and
//! are always applied by item id.

use crate::collection::ItemId;
use crate::reconcile::SharedCollection;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-item completion record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailOutcome {
    pub id: ItemId,
    pub success: bool,
    pub thumbnail_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailProgress {
    pub completed: usize,
    pub total: usize,
}

impl ThumbnailProgress {
    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbnailEvent {
    Progress(ThumbnailProgress),
    Complete(Vec<ThumbnailOutcome>),
}

pub type ThumbnailSender = mpsc::UnboundedSender<ThumbnailEvent>;
pub type ThumbnailReceiver = mpsc::UnboundedReceiver<ThumbnailEvent>;

pub fn channel() -> (ThumbnailSender, ThumbnailReceiver) {
    mpsc::unbounded_channel()
}

/// Applies thumbnail events to a shared collection
#[derive(Clone)]
pub struct ThumbnailSink {
    collection: SharedCollection,
    progress: Arc<RwLock<ThumbnailProgress>>,
}

impl ThumbnailSink {
    pub fn new(collection: SharedCollection) -> Self {
        Self {
            collection,
            progress: Arc::new(RwLock::new(ThumbnailProgress::default())),
        }
    }

    pub fn progress(&self) -> ThumbnailProgress {
        *self.progress.read()
    }

    pub fn reset(&self) {
        *self.progress.write() = ThumbnailProgress::default();
    }

    /// Merge one event; returns how many items were updated
    pub fn apply(&self, event: ThumbnailEvent) -> usize {
        match event {
            ThumbnailEvent::Progress(progress) => {
                *self.progress.write() = progress;
                0
            }
            ThumbnailEvent::Complete(outcomes) => {
                let mut collection = self.collection.write();
                let mut applied = 0;
                for outcome in outcomes {
                    let ready = outcome.success;
                    if collection.set_thumbnail(&outcome.id, ready, outcome.thumbnail_ref) {
                        applied += 1;
                    } else {
                        tracing::debug!(id = %outcome.id, "Thumbnail for unknown item ignored");
                    }
                }
                tracing::debug!(applied, "Thumbnail completion merged");
                applied
            }
        }
    }

    /// Drain events until every sender is dropped
    pub async fn run(self, mut rx: ThumbnailReceiver) {
        while let Some(event) = rx.recv().await {
            self.apply(event);
        }
        tracing::debug!("Thumbnail channel closed");
    }
}
