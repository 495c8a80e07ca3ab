//! Per-section debounce lanes for preference toggles.
//!
//! A lane keeps the last confirmed map (`base`) and the toggles written on
//! top of it, grouped into bursts. The open burst collects toggles until its
//! trailing debounce fires; it is then sealed and committed. The store view
//! of the section is always `base` with every unsettled burst replayed over
//! it in order.
//!
//! Toggles made while the section has no known record are deferred instead.
//! They stay local until either the record is created with them or a
//! refresh finds an existing record, at which point they are pushed as an
//! ordinary burst.
//!
//! Settling a burst either folds it into `base` (confirmed) or drops it
//! (failed). A failed burst therefore takes all of its coalesced toggles
//! with it, while toggles made after it was sealed stay applied.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use facets_model::{PreferenceMap, RecordId, Section};
use parking_lot::Mutex;

use crate::domains::preferences::rules::PreferenceRules;
use crate::engine::coordinator::OptimisticMutation;
use crate::engine::store::{CacheKey, CacheValue, Draft, PreferenceState, Snapshot};
use crate::error::EngineResult;
use crate::infra::services::profile_api::ProfileApi;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Toggle {
    field: String,
    value: bool,
}

#[derive(Debug)]
struct Burst {
    id: u64,
    toggles: Vec<Toggle>,
}

#[derive(Debug, Default)]
struct LaneState {
    record: Option<RecordId>,
    base: PreferenceMap,
    open: Option<Burst>,
    sealed: VecDeque<Burst>,
    deferred: Vec<Toggle>,
    generation: u64,
    next_burst: u64,
}

impl LaneState {
    fn is_idle(&self) -> bool {
        self.open.is_none() && self.sealed.is_empty()
    }

    fn bursts(&self) -> impl Iterator<Item = &Burst> {
        self.sealed.iter().chain(self.open.iter())
    }
}

/// Result of recording one toggle
#[derive(Debug, Clone)]
pub struct Pushed {
    /// Debounce generation the caller's timer must present to seal the burst
    pub generation: u64,
    /// True when this toggle opened a new burst
    pub opened: bool,
    pub view: PreferenceState,
}

#[derive(Debug)]
pub struct PreferenceLane {
    section: Section,
    rules: PreferenceRules,
    state: Mutex<LaneState>,
}

impl PreferenceLane {
    pub fn new(section: Section, rules: PreferenceRules) -> Self {
        Self {
            section,
            rules,
            state: Mutex::new(LaneState::default()),
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().is_idle()
    }

    /// Record a toggle and restart the debounce window.
    ///
    /// `current` is the store's value; an idle lane adopts it as its base so
    /// refreshes that landed between bursts are respected.
    pub fn push(
        &self,
        current: &PreferenceState,
        field: &str,
        value: bool,
    ) -> Pushed {
        let mut state = self.state.lock();
        if state.is_idle() {
            state.base = current.map.clone();
            state.record = current.record;
        }

        let opened = state.open.is_none();
        if opened {
            let id = state.next_burst;
            state.next_burst += 1;
            state.open = Some(Burst {
                id,
                toggles: Vec::new(),
            });
        }
        if let Some(burst) = state.open.as_mut() {
            burst.toggles.push(Toggle {
                field: field.to_string(),
                value,
            });
        }
        state.generation += 1;

        Pushed {
            generation: state.generation,
            opened,
            view: self.view_of(&state),
        }
    }

    /// Remember a toggle made before the section's record is known to exist.
    pub fn defer(&self, field: &str, value: bool) {
        self.state.lock().deferred.push(Toggle {
            field: field.to_string(),
            value,
        });
    }

    /// Drain deferred toggles in the order they were made.
    pub fn take_deferred(&self) -> Vec<(String, bool)> {
        std::mem::take(&mut self.state.lock().deferred)
            .into_iter()
            .map(|toggle| (toggle.field, toggle.value))
            .collect()
    }

    /// Close the open burst if no toggle arrived since `generation`.
    pub fn seal(&self, generation: u64) -> Option<u64> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        let burst = state.open.take()?;
        let id = burst.id;
        state.sealed.push_back(burst);
        Some(id)
    }

    /// Map to send for `burst`: the base plus every sealed burst up to it.
    pub fn payload(&self, burst: u64) -> Option<PreferenceMap> {
        let state = self.state.lock();
        if !state.sealed.iter().any(|b| b.id == burst) {
            return None;
        }
        let mut map = state.base.clone();
        for sealed in &state.sealed {
            self.replay(&mut map, sealed);
            if sealed.id == burst {
                break;
            }
        }
        Some(map)
    }

    /// Retire a sealed burst. Returns false if it was already settled.
    pub fn settle(&self, burst: u64, confirmed: bool) -> bool {
        let mut state = self.state.lock();
        let Some(position) = state.sealed.iter().position(|b| b.id == burst)
        else {
            return false;
        };
        let Some(settled) = state.sealed.remove(position) else {
            return false;
        };
        if confirmed {
            let mut base = std::mem::take(&mut state.base);
            self.replay(&mut base, &settled);
            state.base = base;
        }
        true
    }

    pub fn view(&self) -> PreferenceState {
        self.view_of(&self.state.lock())
    }

    /// Whether an unsettled toggle may still change `field`.
    pub fn is_pending(&self, field: &str) -> bool {
        let state = self.state.lock();
        state.bursts().flat_map(|b| b.toggles.iter()).any(|toggle| {
            toggle.field == field
                || self
                    .rules
                    .affected_by(&toggle.field)
                    .iter()
                    .any(|affected| affected == field)
        })
    }

    fn view_of(&self, state: &LaneState) -> PreferenceState {
        let mut map = state.base.clone();
        for burst in state.bursts() {
            self.replay(&mut map, burst);
        }
        PreferenceState {
            record: state.record,
            map,
        }
    }

    fn replay(&self, map: &mut PreferenceMap, burst: &Burst) {
        for toggle in &burst.toggles {
            self.rules.set(map, &toggle.field, toggle.value);
        }
    }
}

/// Lanes for every section, created on first use
#[derive(Debug)]
pub struct PreferenceLanes {
    rules: PreferenceRules,
    lanes: Mutex<HashMap<Section, Arc<PreferenceLane>>>,
}

impl PreferenceLanes {
    pub fn new(rules: PreferenceRules) -> Self {
        Self {
            rules,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub fn lane(&self, section: Section) -> Arc<PreferenceLane> {
        self.lanes
            .lock()
            .entry(section)
            .or_insert_with(|| {
                Arc::new(PreferenceLane::new(section, self.rules.clone()))
            })
            .clone()
    }

    pub fn get(&self, section: Section) -> Option<Arc<PreferenceLane>> {
        self.lanes.lock().get(&section).cloned()
    }
}

/// The network write for one sealed burst
#[derive(Debug)]
pub struct PreferenceCommit {
    api: Arc<dyn ProfileApi>,
    lane: Arc<PreferenceLane>,
    burst: u64,
}

impl PreferenceCommit {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        lane: Arc<PreferenceLane>,
        burst: u64,
    ) -> Self {
        Self { api, lane, burst }
    }

    fn key(&self) -> CacheKey {
        CacheKey::Preferences(self.lane.section())
    }

    fn write_view(&self, draft: &mut Draft) {
        let mut view = self.lane.view();
        // A record created while the burst was in flight wins.
        if let Some(record) = draft
            .preferences(self.lane.section())
            .and_then(|state| state.record)
        {
            view.record = Some(record);
        }
        draft.put(self.key(), Some(CacheValue::Preferences(view)));
    }
}

#[async_trait]
impl OptimisticMutation for PreferenceCommit {
    type Confirmed = ();

    fn label(&self) -> &'static str {
        "toggle-preferences"
    }

    fn keys(&self) -> Vec<CacheKey> {
        vec![self.key()]
    }

    // Toggles were applied as they happened; this only re-asserts the view.
    fn apply(&self, draft: &mut Draft) {
        self.write_view(draft);
    }

    async fn commit(&self) -> EngineResult<()> {
        let Some(map) = self.lane.payload(self.burst) else {
            log::debug!(
                "[Preferences] Burst {} for {} already settled",
                self.burst,
                self.lane.section()
            );
            return Ok(());
        };
        log::debug!(
            "[Preferences] Sending {} field(s) for {}",
            map.len(),
            self.lane.section()
        );
        self.api
            .patch_preferences(self.lane.section(), map.serialize())
            .await?;
        Ok(())
    }

    fn reconcile(&self, draft: &mut Draft, _confirmed: &()) {
        self.lane.settle(self.burst, true);
        self.write_view(draft);
    }

    fn rollback(&self, draft: &mut Draft, _snapshot: &Snapshot) {
        self.lane.settle(self.burst, false);
        self.write_view(draft);
    }
}
