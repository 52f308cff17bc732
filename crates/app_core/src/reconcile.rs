//! Optimistic label changes reconciled against asynchronous persistence
//!
//! A batch goes through four phases:
//! 1. snapshot every target's current label,
//! 2. write the new label into the collection immediately,
//! 3. fire one `set_label` per target concurrently and wait for all of them,
//! 4. restore the snapshot value for each target whose write failed.
//!
//! [`LabelEngine::begin`] runs phases 1 and 2 synchronously and hands back a
//! [`PendingBatch`]; [`PendingBatch::settle`] runs 3 and 4.
//!
//! Batches are not coordinated with each other. Two overlapping batches on
//! the same id race and the one that settles last wins.

use crate::collection::{Collection, FilteredView, ItemId, Label};
use crate::persistence::Persistence;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Collection shared between the session and in-flight batches
pub type SharedCollection = Arc<RwLock<Collection>>;

/// Outcome of one label batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_ids: Vec<ItemId>,
}

impl BatchResult {
    fn empty() -> Self {
        Self { success: true, ..Self::default() }
    }
}

/// Label reconciliation engine
#[derive(Clone)]
pub struct LabelEngine {
    collection: SharedCollection,
    persistence: Arc<dyn Persistence>,
}

/// A batch whose optimistic write is already in the collection.
///
/// Owns everything it needs, so the persistence phase can run detached from
/// the session.
#[must_use = "a pending batch does nothing until it is settled"]
pub struct PendingBatch {
    collection: SharedCollection,
    persistence: Arc<dyn Persistence>,
    new_label: Label,
    snapshot: Vec<(ItemId, Label)>,
}

impl fmt::Debug for PendingBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingBatch")
            .field("new_label", &self.new_label)
            .field("targets", &self.snapshot.len())
            .finish()
    }
}

impl PendingBatch {
    /// Number of targets that were actually written
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn label(&self) -> Label {
        self.new_label
    }

    /// Phases 3 + 4: fire every write, wait for all, roll back the failures
    pub async fn settle(self) -> BatchResult {
        if self.snapshot.is_empty() {
            return BatchResult::empty();
        }

        // Settle all, no short-circuit
        let outcomes = join_all(
            self.snapshot
                .iter()
                .map(|(id, _)| self.persistence.set_label(id, Some(self.new_label))),
        )
        .await;

        let mut failed_ids = Vec::new();
        {
            let mut collection = self.collection.write();
            for ((id, previous), outcome) in self.snapshot.iter().zip(outcomes) {
                if let Err(e) = outcome {
                    tracing::warn!(id = %id, error = %e, "Label write failed, rolling back");
                    collection.set_label(id, *previous);
                    failed_ids.push(id.clone());
                }
            }
        }

        let failed_count = failed_ids.len();
        let success_count = self.snapshot.len() - failed_count;
        tracing::debug!(
            label = self.new_label.as_str(),
            success_count,
            failed_count,
            "Label batch settled"
        );

        BatchResult {
            success: failed_count == 0,
            success_count,
            failed_count,
            failed_ids,
        }
    }
}

impl LabelEngine {
    pub fn new(collection: SharedCollection, persistence: Arc<dyn Persistence>) -> Self {
        Self { collection, persistence }
    }

    /// Phases 1 + 2: snapshot every target and write `new_label` into the
    /// collection, under a single write lock so the UI never sees half a batch.
    /// Duplicate and unknown ids are skipped.
    pub fn begin(&self, target_ids: &[ItemId], new_label: Label) -> PendingBatch {
        let snapshot = {
            let mut collection = self.collection.write();
            let mut seen = HashSet::new();
            let mut snapshot = Vec::with_capacity(target_ids.len());
            for id in target_ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                match collection.label_of(id) {
                    Some(previous) => {
                        collection.set_label(id, new_label);
                        snapshot.push((id.clone(), previous));
                    }
                    None => tracing::debug!(id = %id, "Label target not in collection, skipped"),
                }
            }
            snapshot
        };

        PendingBatch {
            collection: self.collection.clone(),
            persistence: self.persistence.clone(),
            new_label,
            snapshot,
        }
    }

    /// Toggle batch; the first target that exists decides the new label
    pub fn begin_toggle(&self, target_ids: &[ItemId]) -> PendingBatch {
        let reference = {
            let collection = self.collection.read();
            target_ids.iter().find_map(|id| collection.label_of(id))
        };
        let targets: &[ItemId] = if reference.is_some() { target_ids } else { &[] };
        self.begin(targets, reference.unwrap_or_default().inverted())
    }

    /// Invert one item's own label
    pub fn begin_toggle_by_stable_id(&self, id: &str) -> PendingBatch {
        let current = self.collection.read().label_of(id);
        match current {
            Some(label) => self.begin(&[id.to_string()], label.inverted()),
            None => self.begin(&[], Label::default()),
        }
    }

    /// Set `new_label` on every target, keeping it only where persistence confirms
    pub async fn apply_label(&self, target_ids: &[ItemId], new_label: Label) -> BatchResult {
        self.begin(target_ids, new_label).settle().await
    }

    pub async fn toggle_label(&self, target_ids: &[ItemId]) -> BatchResult {
        self.begin_toggle(target_ids).settle().await
    }

    pub async fn toggle_by_stable_id(&self, id: &str) -> BatchResult {
        self.begin_toggle_by_stable_id(id).settle().await
    }

    /// Reject everything currently visible
    pub async fn mark_all_rejected(&self, view: &FilteredView) -> BatchResult {
        self.apply_label(view.ids(), Label::Rejected).await
    }

    /// Clear the rejection on everything currently visible
    pub async fn remove_all_rejected(&self, view: &FilteredView) -> BatchResult {
        self.apply_label(view.ids(), Label::Adopted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{FilterPredicate, Item};
    use crate::test_support::MockPersistence;
    use std::time::Duration;

    fn shared(names: &[&str]) -> SharedCollection {
        let items = names.iter().map(|n| Item::new(*n, *n, 0, None)).collect();
        Arc::new(RwLock::new(Collection::load(items, &[])))
    }

    fn ids(names: &[&str]) -> Vec<ItemId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_all_writes_succeed() {
        let collection = shared(&["a.jpg", "b.jpg", "c.jpg"]);
        let mock = Arc::new(MockPersistence::new());
        let engine = LabelEngine::new(collection.clone(), mock.clone());

        let result = engine.apply_label(&ids(&["a.jpg", "b.jpg", "c.jpg"]), Label::Rejected).await;

        assert_eq!(
            result,
            BatchResult { success: true, success_count: 3, failed_count: 0, failed_ids: vec![] }
        );
        let c = collection.read();
        assert!(c.items().iter().all(|i| i.label == Label::Rejected));
        assert_eq!(mock.label_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_single_failure_rolls_back_only_that_id() {
        let collection = shared(&["a.jpg", "b.jpg", "c.jpg"]);
        let mock = Arc::new(MockPersistence::new().failing(["b.jpg"]));
        let engine = LabelEngine::new(collection.clone(), mock);

        let result = engine.apply_label(&ids(&["a.jpg", "b.jpg", "c.jpg"]), Label::Rejected).await;

        assert_eq!(
            result,
            BatchResult {
                success: false,
                success_count: 2,
                failed_count: 1,
                failed_ids: ids(&["b.jpg"]),
            }
        );
        let c = collection.read();
        assert_eq!(c.label_of("a.jpg"), Some(Label::Rejected));
        assert_eq!(c.label_of("b.jpg"), Some(Label::Adopted));
        assert_eq!(c.label_of("c.jpg"), Some(Label::Rejected));
    }

    #[tokio::test]
    async fn test_failure_does_not_cut_batch_short() {
        let collection = shared(&["a", "b", "c", "d"]);
        let mock = Arc::new(
            MockPersistence::new()
                .failing(["a"])
                .with_delay("d", Duration::from_millis(30)),
        );
        let engine = LabelEngine::new(collection.clone(), mock.clone());

        let result = engine.apply_label(&ids(&["a", "b", "c", "d"]), Label::Rejected).await;

        assert_eq!(result.success_count, 3);
        assert_eq!(mock.label_calls().len(), 4);
        assert_eq!(collection.read().label_of("d"), Some(Label::Rejected));
    }

    #[tokio::test]
    async fn test_optimistic_state_is_visible_before_settlement() {
        let collection = shared(&["a"]);
        let mock = Arc::new(MockPersistence::new().with_delay("a", Duration::from_millis(50)));
        let engine = LabelEngine::new(collection.clone(), mock);

        let observer = collection.clone();
        let targets = ids(&["a"]);
        let (result, seen) = tokio::join!(
            engine.apply_label(&targets, Label::Rejected),
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                observer.read().label_of("a")
            }
        );

        assert!(result.success);
        assert_eq!(seen, Some(Label::Rejected));
    }

    #[tokio::test]
    async fn test_toggle_uses_first_target_as_reference() {
        let collection = shared(&["a", "b", "c"]);
        collection.write().set_label("b", Label::Rejected);
        let engine = LabelEngine::new(collection.clone(), Arc::new(MockPersistence::new()));

        // a is adopted, so the whole mixed batch becomes rejected
        engine.toggle_label(&ids(&["a", "b", "c"])).await;
        let c = collection.read();
        assert!(c.items().iter().all(|i| i.label == Label::Rejected));
    }

    #[tokio::test]
    async fn test_toggle_by_stable_id_inverts_own_label() {
        let collection = shared(&["a", "b"]);
        collection.write().set_label("b", Label::Rejected);
        let engine = LabelEngine::new(collection.clone(), Arc::new(MockPersistence::new()));

        engine.toggle_by_stable_id("b").await;
        engine.toggle_by_stable_id("a").await;
        let c = collection.read();
        assert_eq!(c.label_of("a"), Some(Label::Rejected));
        assert_eq!(c.label_of("b"), Some(Label::Adopted));
    }

    #[tokio::test]
    async fn test_rollback_uses_snapshot_not_current_value() {
        let collection = shared(&["a"]);
        let mock = Arc::new(
            MockPersistence::new()
                .failing(["a"])
                .with_delay("a", Duration::from_millis(40)),
        );
        let engine = LabelEngine::new(collection.clone(), mock);

        let targets = ids(&["a"]);
        let batch = engine.apply_label(&targets, Label::Rejected);
        let meddle = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            // Something else wrote in the meantime
            collection.write().set_label("a", Label::Rejected);
        };
        let (result, _) = tokio::join!(batch, meddle);

        assert_eq!(result.failed_ids, ids(&["a"]));
        assert_eq!(collection.read().label_of("a"), Some(Label::Adopted));
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_targets() {
        let collection = shared(&["a"]);
        let mock = Arc::new(MockPersistence::new());
        let engine = LabelEngine::new(collection.clone(), mock.clone());

        let result = engine.apply_label(&ids(&["a", "a", "ghost"]), Label::Rejected).await;
        assert_eq!(result.success_count, 1);
        assert_eq!(mock.label_calls().len(), 1);

        let result = engine.apply_label(&[], Label::Rejected).await;
        assert!(result.success);
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn test_mark_and_remove_all_rejected() {
        let collection = shared(&["a", "b", "c"]);
        let engine = LabelEngine::new(collection.clone(), Arc::new(MockPersistence::new()));

        let view = collection.read().filtered_view(FilterPredicate::All);
        let result = engine.mark_all_rejected(&view).await;
        assert_eq!(result.success_count, 3);
        assert_eq!(collection.read().counts().rejected, 3);

        let view = collection.read().filtered_view(FilterPredicate::RejectedOnly);
        engine.remove_all_rejected(&view).await;
        assert_eq!(collection.read().counts().rejected, 0);
    }

    #[tokio::test]
    async fn test_pending_batch_is_visible_before_settle() {
        let collection = shared(&["a", "b"]);
        let mock = Arc::new(MockPersistence::new().failing(["b"]));
        let engine = LabelEngine::new(collection.clone(), mock.clone());

        let pending = engine.begin(&ids(&["a", "b"]), Label::Rejected);
        assert_eq!(pending.len(), 2);
        assert_eq!(collection.read().counts().rejected, 2);
        assert!(mock.label_calls().is_empty());

        let result = pending.settle().await;
        assert_eq!(result.failed_ids, ids(&["b"]));
        assert_eq!(collection.read().label_of("b"), Some(Label::Adopted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_batches_roll_back_to_own_snapshot() {
        let collection = shared(&["a"]);
        let mock = Arc::new(MockPersistence::new().with_call_plan(
            "a",
            [(Duration::from_millis(20), true), (Duration::from_millis(5), false)],
        ));
        let first = LabelEngine::new(collection.clone(), mock.clone());
        let second = first.clone();

        // first: Adopted -> Rejected, confirmed late
        // second: Rejected -> Adopted, rejected early
        let targets = ids(&["a"]);
        let reject = first.begin(&targets, Label::Rejected);
        let adopt = second.begin(&targets, Label::Adopted);
        let (rejected, adopted) = tokio::join!(reject.settle(), adopt.settle());

        assert!(rejected.success);
        assert_eq!(adopted.failed_ids, targets);
        // second restored its own pre-batch value, not the original Adopted
        assert_eq!(collection.read().label_of("a"), Some(Label::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_batches_last_settle_wins() {
        let collection = shared(&["a"]);
        let mock = Arc::new(MockPersistence::new().with_call_plan(
            "a",
            [(Duration::from_millis(20), false), (Duration::from_millis(5), true)],
        ));
        let first = LabelEngine::new(collection.clone(), mock.clone());
        let second = first.clone();

        let targets = ids(&["a"]);
        let early = first.begin(&targets, Label::Rejected);
        let late = second.begin(&targets, Label::Rejected);
        let (failed, confirmed) = tokio::join!(early.settle(), late.settle());

        assert!(confirmed.success);
        assert_eq!(failed.failed_ids, targets);
        // the failing batch settles last and restores its snapshot over the
        // confirmed write
        assert_eq!(collection.read().label_of("a"), Some(Label::Adopted));
        assert_eq!(mock.label_calls().len(), 2);
    }
}
