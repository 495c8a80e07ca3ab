//! Optimistic mutation coordinator
//!
//! Every write in the engine follows the same lifecycle:
//!
//! 1. begin: take the per-key locks for the mutation's key set, waiting for
//!    any earlier mutation on those keys to settle, then bump the keys'
//!    epochs so refreshes issued earlier cannot land on top of us.
//! 2. snapshot the key set and let the mutation refuse to run against it.
//!    A refused mutation leaves the store untouched and is not reported.
//! 3. apply the optimistic transform; readers see it immediately.
//! 4. commit over the network. On success reconcile the confirmed value into
//!    the store and mark the keys stale. On failure restore the snapshot and
//!    hand the error to the failure reporter.
//!
//! The locks are held from begin until settle, so a second mutation always
//! snapshots the value the first one settled on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::engine::store::{CacheKey, ChangeKind, Draft, ProfileStore, Snapshot};
use crate::error::{EngineError, EngineResult};
use crate::infra::reporting::FailureReporter;

/// Whether a failed commit is surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Notify,
    /// Background repairs: logged, never toasted
    Silent,
}

/// One optimistic write, described as pure transforms over its key set
#[async_trait]
pub trait OptimisticMutation: Send + Sync {
    type Confirmed: Send + Sync;

    fn label(&self) -> &'static str;

    fn keys(&self) -> Vec<CacheKey>;

    /// Last check against the locked key set, before anything is written.
    fn admit(&self, _current: &Snapshot) -> EngineResult<()> {
        Ok(())
    }

    fn apply(&self, draft: &mut Draft);

    async fn commit(&self) -> EngineResult<Self::Confirmed>;

    /// Merge the confirmed server value into the optimistic one.
    fn reconcile(&self, _draft: &mut Draft, _confirmed: &Self::Confirmed) {}

    fn rollback(&self, draft: &mut Draft, snapshot: &Snapshot) {
        for key in snapshot.keys() {
            draft.put(key, snapshot.get(key).cloned());
        }
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Notify
    }
}

/// Guards post-suspension store writes once the owning view is gone
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn revive(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Exclusive async lock per cache key
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: parking_lot::Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    fn lock_for(&self, key: CacheKey) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(key).or_default().clone()
    }

    /// Keys must be sorted so concurrent multi-key acquisitions cannot cycle.
    pub async fn acquire(&self, keys: &[CacheKey]) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock_for(*key).lock_owned().await);
        }
        guards
    }

    pub fn is_held(&self, key: CacheKey) -> bool {
        self.locks
            .lock()
            .get(&key)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}

struct InFlight<'a> {
    store: &'a ProfileStore,
    keys: &'a [CacheKey],
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.end_mutation(self.keys);
    }
}

pub struct Coordinator {
    store: Arc<ProfileStore>,
    locks: KeyLocks,
    liveness: Liveness,
    reporter: Arc<dyn FailureReporter>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("store", &self.store)
            .field("alive", &self.liveness.is_alive())
            .finish()
    }
}

impl Coordinator {
    pub fn new(
        store: Arc<ProfileStore>,
        liveness: Liveness,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            store,
            locks: KeyLocks::default(),
            liveness,
            reporter,
        }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn reporter(&self) -> &Arc<dyn FailureReporter> {
        &self.reporter
    }

    pub fn is_busy(&self, key: CacheKey) -> bool {
        self.locks.is_held(key)
    }

    pub async fn run<M: OptimisticMutation>(
        &self,
        mutation: &M,
    ) -> EngineResult<M::Confirmed> {
        let label = mutation.label();
        let mut keys = mutation.keys();
        keys.sort();
        keys.dedup();

        let _held = self.locks.acquire(&keys).await;
        if !self.liveness.is_alive() {
            return Err(EngineError::Unmounted);
        }
        self.store.begin_mutation(&keys);
        let _in_flight = InFlight {
            store: &self.store,
            keys: &keys,
        };

        let snapshot = self.store.snapshot(&keys);
        if let Err(err) = mutation.admit(&snapshot) {
            log::debug!("[Coordinator] {label}: refused before apply: {err}");
            return Err(err);
        }
        self.store
            .transact(&keys, ChangeKind::Optimistic, |draft| {
                mutation.apply(draft)
            });
        log::debug!(
            "[Coordinator] {label}: optimistic write to {} key(s)",
            keys.len()
        );

        match mutation.commit().await {
            Ok(confirmed) => {
                if self.liveness.is_alive() {
                    self.store.transact(
                        &keys,
                        ChangeKind::Reconciled,
                        |draft| mutation.reconcile(draft, &confirmed),
                    );
                    self.store.mark_stale(&keys);
                }
                log::debug!("[Coordinator] {label}: confirmed");
                Ok(confirmed)
            }
            Err(err) => {
                if self.liveness.is_alive() {
                    self.store.transact(
                        &keys,
                        ChangeKind::RolledBack,
                        |draft| mutation.rollback(draft, &snapshot),
                    );
                }
                log::warn!("[Coordinator] {label}: rolled back after {err}");
                if mutation.failure_policy() == FailurePolicy::Notify {
                    self.reporter.report(label, &err);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::{CacheValue, PreferenceState};
    use crate::error::ApiError;
    use crate::infra::testing::RecordingReporter;
    use facets_model::{PreferenceMap, RecordId, Section};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    const KEY: CacheKey = CacheKey::Preferences(Section::Job);

    struct SetField {
        field: &'static str,
        value: bool,
        fail: bool,
        refuse: bool,
        gate: Option<Arc<Semaphore>>,
        policy: FailurePolicy,
    }

    impl SetField {
        fn new(field: &'static str, value: bool) -> Self {
            Self {
                field,
                value,
                fail: false,
                refuse: false,
                gate: None,
                policy: FailurePolicy::Notify,
            }
        }
    }

    #[async_trait]
    impl OptimisticMutation for SetField {
        type Confirmed = ();

        fn label(&self) -> &'static str {
            "set-field"
        }

        fn keys(&self) -> Vec<CacheKey> {
            vec![KEY]
        }

        fn admit(&self, _current: &Snapshot) -> EngineResult<()> {
            if self.refuse {
                return Err(ApiError::Other("refused".into()).into());
            }
            Ok(())
        }

        fn apply(&self, draft: &mut Draft) {
            let mut state = draft
                .get(KEY)
                .and_then(CacheValue::as_preferences)
                .cloned()
                .unwrap_or_default();
            state.map.set(self.field, self.value);
            draft.put(KEY, Some(CacheValue::Preferences(state)));
        }

        async fn commit(&self) -> EngineResult<()> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            if self.fail {
                return Err(ApiError::Other("boom".into()).into());
            }
            Ok(())
        }

        fn failure_policy(&self) -> FailurePolicy {
            self.policy
        }
    }

    fn seeded_store() -> Arc<ProfileStore> {
        let store = Arc::new(ProfileStore::new());
        store.set(
            KEY,
            CacheValue::Preferences(PreferenceState {
                record: Some(RecordId(1)),
                map: PreferenceMap::new().with("a", true),
            }),
        );
        store
    }

    fn field(store: &ProfileStore, name: &str) -> Option<bool> {
        store.preferences(Section::Job).and_then(|s| s.map.get(name))
    }

    #[tokio::test]
    async fn success_keeps_the_optimistic_value_and_marks_stale() {
        let store = seeded_store();
        let reporter = Arc::new(RecordingReporter::default());
        let coordinator =
            Coordinator::new(store.clone(), Liveness::default(), reporter.clone());

        coordinator.run(&SetField::new("a", false)).await.unwrap();

        assert_eq!(field(&store, "a"), Some(false));
        assert!(store.is_stale(KEY));
        assert!(!store.in_flight(KEY));
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn failure_restores_snapshot_and_reports_once() {
        let store = seeded_store();
        let before = store.snapshot(&[KEY]);
        let reporter = Arc::new(RecordingReporter::default());
        let coordinator =
            Coordinator::new(store.clone(), Liveness::default(), reporter.clone());

        let mut mutation = SetField::new("a", false);
        mutation.fail = true;
        assert!(coordinator.run(&mutation).await.is_err());

        assert_eq!(store.snapshot(&[KEY]), before);
        assert_eq!(reporter.reports(), vec!["set-field".to_string()]);
    }

    #[tokio::test]
    async fn refused_mutation_writes_nothing_and_releases_its_keys() {
        let store = seeded_store();
        let before = store.snapshot(&[KEY]);
        let reporter = Arc::new(RecordingReporter::default());
        let coordinator =
            Coordinator::new(store.clone(), Liveness::default(), reporter.clone());

        let mut mutation = SetField::new("a", false);
        mutation.refuse = true;
        assert!(coordinator.run(&mutation).await.is_err());

        assert_eq!(store.snapshot(&[KEY]), before);
        assert!(!store.in_flight(KEY));
        assert!(!coordinator.is_busy(KEY));
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn silent_failures_are_not_reported() {
        let store = seeded_store();
        let reporter = Arc::new(RecordingReporter::default());
        let coordinator =
            Coordinator::new(store, Liveness::default(), reporter.clone());

        let mut mutation = SetField::new("a", false);
        mutation.fail = true;
        mutation.policy = FailurePolicy::Silent;
        assert!(coordinator.run(&mutation).await.is_err());
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn second_mutation_snapshots_after_the_first_settles() {
        let store = seeded_store();
        let reporter = Arc::new(RecordingReporter::default());
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            Liveness::default(),
            reporter,
        ));

        let gate = Arc::new(Semaphore::new(0));
        let mut first = SetField::new("b", true);
        first.gate = Some(gate.clone());

        let c1 = coordinator.clone();
        let first_task = tokio::spawn(async move { c1.run(&first).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(field(&store, "b"), Some(true));
        assert!(coordinator.is_busy(KEY));

        // Queued behind the first; fails once it gets its turn.
        let mut second = SetField::new("c", true);
        second.fail = true;
        let c2 = coordinator.clone();
        let second_task = tokio::spawn(async move { c2.run(&second).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(field(&store, "c"), None);

        gate.add_permits(1);
        first_task.await.unwrap().unwrap();
        assert!(second_task.await.unwrap().is_err());

        // The rollback restored the value the first mutation settled on.
        assert_eq!(field(&store, "b"), Some(true));
        assert_eq!(field(&store, "c"), None);
        assert!(!coordinator.is_busy(KEY));
    }

    #[tokio::test]
    async fn unmounted_coordinator_refuses_new_work_and_skips_writes() {
        let store = seeded_store();
        let liveness = Liveness::default();
        let reporter = Arc::new(RecordingReporter::default());
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            liveness.clone(),
            reporter,
        ));

        let gate = Arc::new(Semaphore::new(0));
        let mut pending = SetField::new("a", false);
        pending.fail = true;
        pending.gate = Some(gate.clone());
        let c1 = coordinator.clone();
        let task = tokio::spawn(async move { c1.run(&pending).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        liveness.kill();
        gate.add_permits(1);
        assert!(task.await.unwrap().is_err());
        // Rollback skipped: the view is gone.
        assert_eq!(field(&store, "a"), Some(false));

        let err = coordinator.run(&SetField::new("a", true)).await.unwrap_err();
        assert!(matches!(err, EngineError::Unmounted));
    }
}
