//! In-memory persistence double for tests

use crate::collection::Label;
use crate::persistence::{ExportMode, ExportSummary, FolderSnapshot, Persistence};
use crate::AppError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

#[derive(Default)]
pub struct MockPersistence {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    call_plans: Mutex<HashMap<String, VecDeque<(Duration, bool)>>>,
    snapshot: Option<FolderSnapshot>,
    fail_open: bool,
    fail_save: bool,
    label_calls: Mutex<Vec<(String, Option<Label>)>>,
    saved_indices: Mutex<Vec<usize>>,
    exports: Mutex<Vec<ExportMode>>,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// `set_label` rejects these ids
    pub fn failing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(ids.into_iter().map(Into::into));
        self
    }

    /// `set_label` for `id` settles only after `delay`
    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    /// Script successive `set_label` calls for `id` as (delay, succeeds);
    /// once the plan runs out the usual failure/delay settings apply
    pub fn with_call_plan<I>(self, id: &str, plan: I) -> Self
    where
        I: IntoIterator<Item = (Duration, bool)>,
    {
        self.call_plans.lock().insert(id.to_string(), plan.into_iter().collect());
        self
    }

    pub fn with_snapshot(mut self, snapshot: FolderSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn label_calls(&self) -> Vec<(String, Option<Label>)> {
        self.label_calls.lock().clone()
    }

    pub fn saved_indices(&self) -> Vec<usize> {
        self.saved_indices.lock().clone()
    }

    pub fn exports(&self) -> Vec<ExportMode> {
        self.exports.lock().clone()
    }
}

#[async_trait]
impl Persistence for MockPersistence {
    async fn open_folder(&self, path: &Path) -> Result<FolderSnapshot, AppError> {
        if self.fail_open {
            return Err(AppError::NotFound(path.display().to_string()));
        }
        Ok(self.snapshot.clone().unwrap_or_default())
    }

    async fn set_label(&self, id: &str, label: Option<Label>) -> Result<(), AppError> {
        self.label_calls.lock().push((id.to_string(), label));
        let planned = self.call_plans.lock().get_mut(id).and_then(VecDeque::pop_front);
        if let Some((delay, succeeds)) = planned {
            tokio::time::sleep(delay).await;
            if succeeds {
                return Ok(());
            }
            return Err(AppError::Persistence(format!("write rejected for {}", id)));
        }
        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(id) {
            return Err(AppError::Persistence(format!("write rejected for {}", id)));
        }
        Ok(())
    }

    async fn save_selected_index(&self, index: usize) -> Result<(), AppError> {
        self.saved_indices.lock().push(index);
        if self.fail_save {
            return Err(AppError::Persistence("disk full".into()));
        }
        Ok(())
    }

    async fn export_selection(
        &self,
        _source: &Path,
        _dest: &Path,
        mode: ExportMode,
    ) -> Result<ExportSummary, AppError> {
        self.exports.lock().push(mode);
        Ok(ExportSummary::default())
    }
}
