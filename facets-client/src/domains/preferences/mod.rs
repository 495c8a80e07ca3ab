//! Preference domain: field visibility toggles per section.
//!
//! While a section's profile record exists, toggles are applied to the store
//! at once and written back through a trailing debounce per section. Before
//! the record is known to exist they stay local: they travel with the
//! creation payload, or are replayed through the debounce once a refresh
//! finds the record.

pub mod lane;
pub mod rules;

pub use lane::{PreferenceCommit, PreferenceLane, PreferenceLanes};
pub use rules::{Coupling, CouplingRule, PreferenceRules};

use facets_model::{RecordId, Section, SerializedPreferences};

use crate::domains::ProfileEngine;
use crate::engine::store::{CacheKey, CacheValue, ChangeKind, PreferenceState};
use crate::error::{EngineError, EngineResult};

impl ProfileEngine {
    /// Flip `field` for `section` and return its new value.
    ///
    /// Coupled fields are updated in the same step. The network write, if
    /// any, happens once the section has seen no toggle for the debounce
    /// interval.
    pub fn toggle(&self, section: Section, field: &str) -> EngineResult<bool> {
        let inner = &self.inner;
        if !self.is_mounted() {
            return Err(EngineError::Unmounted);
        }

        let key = CacheKey::Preferences(section);
        let value = !self
            .effective_preferences(section)
            .get(field)
            .unwrap_or(inner.config.default_visibility);
        let current = inner.store.preferences(section).unwrap_or_default();

        if !current.record_exists() {
            inner.lanes.lane(section).defer(field, value);
            inner.store.transact(&[key], ChangeKind::Optimistic, |draft| {
                let mut state = draft.preferences(section).unwrap_or_default();
                inner.config.coupling.set(&mut state.map, field, value);
                draft.put(key, Some(CacheValue::Preferences(state)));
            });
            log::debug!(
                "[Preferences] No {section} record known, deferring {field}={value}"
            );
            return Ok(value);
        }

        self.push_toggle(section, field, value);
        Ok(value)
    }

    /// Push deferred toggles as a burst now that the record is known.
    pub(crate) fn replay_deferred(&self, section: Section) {
        let Some(lane) = self.inner.lanes.get(section) else {
            return;
        };
        let deferred = lane.take_deferred();
        if deferred.is_empty() {
            return;
        }
        log::debug!(
            "[Preferences] Replaying {} deferred toggle(s) for {section}",
            deferred.len()
        );
        for (field, value) in deferred {
            self.push_toggle(section, &field, value);
        }
    }

    fn push_toggle(&self, section: Section, field: &str, value: bool) {
        let inner = &self.inner;
        let key = CacheKey::Preferences(section);
        let current = inner.store.preferences(section).unwrap_or_default();
        let lane = inner.lanes.lane(section);
        let pushed = lane.push(&current, field, value);
        if pushed.opened {
            // Held until the burst settles so refreshes cannot clobber it.
            inner.store.begin_mutation(&[key]);
        }
        inner.store.transact(&[key], ChangeKind::Optimistic, |draft| {
            draft.put(key, Some(CacheValue::Preferences(pushed.view.clone())));
        });

        let engine = self.clone();
        let generation = pushed.generation;
        let timer = inner.time.sleep(inner.config.debounce());
        tokio::spawn(async move {
            timer.await;
            engine.flush_preferences(section, generation).await;
        });
    }

    /// Serialized effective map for the record-creation payload.
    pub fn creation_preferences(&self, section: Section) -> SerializedPreferences {
        self.effective_preferences(section).serialize()
    }

    /// The section's record now exists server-side with the creation payload.
    pub fn record_created(&self, section: Section, record: RecordId) {
        // Already carried by the creation payload.
        if let Some(lane) = self.inner.lanes.get(section) {
            lane.take_deferred();
        }
        let map = self.effective_preferences(section);
        let key = CacheKey::Preferences(section);
        self.inner
            .store
            .transact(&[key], ChangeKind::Reconciled, |draft| {
                draft.put(
                    key,
                    Some(CacheValue::Preferences(PreferenceState {
                        record: Some(record),
                        map,
                    })),
                );
            });
        log::debug!("[Preferences] {section} record {record} created");
    }

    /// Debounce deadline for `generation` reached.
    async fn flush_preferences(&self, section: Section, generation: u64) {
        let inner = &self.inner;
        let lane = inner.lanes.lane(section);
        let Some(burst) = lane.seal(generation) else {
            return;
        };

        let key = CacheKey::Preferences(section);
        let mutation = PreferenceCommit::new(inner.api.clone(), lane.clone(), burst);
        let result = inner.coordinator.run(&mutation).await;
        // Already settled by reconcile/rollback unless the view was unmounted.
        lane.settle(burst, result.is_ok());
        inner.store.end_mutation(&[key]);

        if lane.is_idle() {
            self.settled(&[key]);
        }
    }
}
