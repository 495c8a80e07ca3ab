use std::sync::Arc;

use facets_model::Section;
use parking_lot::Mutex;

use crate::engine::selectors::primary_photo_url;
use crate::engine::store::{
    CacheKey, CacheValue, ChangeKind, ProfileStore, StoreChange,
    StoreSubscriber,
};
use crate::error::{EngineError, FailureKind};
use crate::infra::reporting::FailureReporter;

/// A failure notification as the UI would have received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub action: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Collects every failure notification the engine raises.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action labels in the order they were reported.
    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .iter()
            .map(|report| report.action.clone())
            .collect()
    }

    pub fn detailed(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

impl FailureReporter for RecordingReporter {
    fn report(&self, action: &str, error: &EngineError) {
        self.reports.lock().push(Report {
            action: action.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// Store subscriber that keeps every change it is told about.
///
/// Stands in for a denormalized consumer such as a parent view holding its
/// own copy of a section's photo list.
#[derive(Debug, Default)]
pub struct ChangeLog {
    changes: Mutex<Vec<StoreChange>>,
}

impl ChangeLog {
    /// Create a log already subscribed to `store`.
    pub fn attach(store: &ProfileStore) -> Arc<Self> {
        let log = Arc::new(Self::default());
        store.subscribe(&log);
        log
    }

    pub fn changes(&self) -> Vec<StoreChange> {
        self.changes.lock().clone()
    }

    pub fn for_key(&self, key: CacheKey) -> Vec<StoreChange> {
        self.changes
            .lock()
            .iter()
            .filter(|change| change.key == key)
            .cloned()
            .collect()
    }

    pub fn kinds(&self, key: CacheKey) -> Vec<ChangeKind> {
        self.for_key(key).into_iter().map(|change| change.kind).collect()
    }

    /// Primary photo source for `section` after each change to its collection.
    ///
    /// Rebuilds a throwaway store per change so the answer comes from the
    /// same selector the UI uses.
    pub fn primary_sources(&self, section: Section) -> Vec<Option<String>> {
        let key = CacheKey::SectionPhotos(section);
        self.for_key(key)
            .into_iter()
            .map(|change| {
                let view = ProfileStore::new();
                if let Some(value @ CacheValue::Photos(_)) = change.value {
                    view.set(key, value);
                }
                primary_photo_url(&view, section)
            })
            .collect()
    }

    pub fn clear(&self) {
        self.changes.lock().clear();
    }
}

impl StoreSubscriber for ChangeLog {
    fn on_store_changed(&self, change: &StoreChange) {
        self.changes.lock().push(change.clone());
    }
}
