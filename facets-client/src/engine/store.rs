//! ProfileStore - single source of truth for profile photos and preferences
//!
//! The store is a keyed cache of collections shared by every mounted section
//! view. Multi-key writes happen under one lock so readers never observe a
//! half-applied mutation, and every write is announced to subscribers once
//! the lock is released.
//!
//! Each key also carries bookkeeping the coordinator relies on:
//! - `epoch` increases whenever a mutation begins on the key; a background
//!   refresh issued under an older epoch is discarded when it lands.
//! - `in_flight` counts mutations and open preference bursts holding the key;
//!   no refresh ticket is issued while it is non-zero.
//! - `stale` marks keys whose confirmed value should be re-read from the
//!   server on the next revalidation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use facets_model::{Photo, PreferenceMap, RecordId, Section};
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    /// Every photo the owner has, regardless of section
    AllPhotos,
    SectionPhotos(Section),
    Preferences(Section),
}

impl CacheKey {
    pub fn section(&self) -> Option<Section> {
        match self {
            CacheKey::AllPhotos => None,
            CacheKey::SectionPhotos(section)
            | CacheKey::Preferences(section) => Some(*section),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllPhotos => write!(f, "photos"),
            CacheKey::SectionPhotos(section) => write!(f, "photos/{section}"),
            CacheKey::Preferences(section) => {
                write!(f, "preferences/{section}")
            }
        }
    }
}

/// Preference map plus whether the owning profile record exists server-side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceState {
    pub record: Option<RecordId>,
    pub map: PreferenceMap,
}

impl PreferenceState {
    pub fn record_exists(&self) -> bool {
        self.record.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Photos(Vec<Photo>),
    Preferences(PreferenceState),
}

impl CacheValue {
    pub fn as_photos(&self) -> Option<&[Photo]> {
        match self {
            CacheValue::Photos(photos) => Some(photos),
            CacheValue::Preferences(_) => None,
        }
    }

    pub fn as_preferences(&self) -> Option<&PreferenceState> {
        match self {
            CacheValue::Preferences(state) => Some(state),
            CacheValue::Photos(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Hydration or direct bulk set
    Seeded,
    Optimistic,
    Reconciled,
    RolledBack,
    Refreshed,
}

/// Change event for subscribers
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub key: CacheKey,
    pub kind: ChangeKind,
    pub value: Option<CacheValue>,
}

/// Trait for consumers that mirror store state (denormalized copies, views)
pub trait StoreSubscriber: Send + Sync {
    fn on_store_changed(&self, change: &StoreChange);
}

/// Captured prior values of a key set, kept for one in-flight mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    values: BTreeMap<CacheKey, Option<CacheValue>>,
}

impl Snapshot {
    pub fn get(&self, key: CacheKey) -> Option<&CacheValue> {
        self.values.get(&key).and_then(Option::as_ref)
    }

    pub fn keys(&self) -> impl Iterator<Item = CacheKey> + '_ {
        self.values.keys().copied()
    }
}

/// Working copy of a key set handed to apply/reconcile/rollback closures
#[derive(Debug)]
pub struct Draft {
    values: BTreeMap<CacheKey, Option<CacheValue>>,
}

impl Draft {
    pub fn get(&self, key: CacheKey) -> Option<&CacheValue> {
        self.values.get(&key).and_then(Option::as_ref)
    }

    /// Photos under `key`, or an empty list when nothing is cached.
    pub fn photos(&self, key: CacheKey) -> Vec<Photo> {
        self.get(key)
            .and_then(CacheValue::as_photos)
            .map(<[Photo]>::to_vec)
            .unwrap_or_default()
    }

    pub fn preferences(&self, section: Section) -> Option<PreferenceState> {
        self.get(CacheKey::Preferences(section))
            .and_then(CacheValue::as_preferences)
            .cloned()
    }

    pub fn put(&mut self, key: CacheKey, value: Option<CacheValue>) {
        match self.values.get_mut(&key) {
            Some(slot) => *slot = value,
            None => log::warn!(
                "[ProfileStore] Ignoring write to undeclared key {key}"
            ),
        }
    }

    pub fn update_photos(
        &mut self,
        key: CacheKey,
        f: impl FnOnce(&mut Vec<Photo>),
    ) {
        let mut photos = self.photos(key);
        f(&mut photos);
        self.put(key, Some(CacheValue::Photos(photos)));
    }
}

/// Permission to write one background read result back into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    key: CacheKey,
    epoch: u64,
}

impl RefreshTicket {
    pub fn key(&self) -> CacheKey {
        self.key
    }
}

#[derive(Debug, Default)]
struct Entry {
    value: Option<CacheValue>,
    epoch: u64,
    in_flight: usize,
    stale: bool,
}

pub struct ProfileStore {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    subscribers: RwLock<Vec<Weak<dyn StoreSubscriber>>>,
}

impl fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileStore")
            .field("keys", &self.entries.read().len())
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a subscriber. The store only keeps a weak handle.
    pub fn subscribe<S: StoreSubscriber + 'static>(&self, subscriber: &Arc<S>) {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        let weak: Weak<dyn StoreSubscriber> = weak;
        self.subscribers.write().push(weak);
    }

    pub fn get(&self, key: CacheKey) -> Option<CacheValue> {
        self.entries.read().get(&key).and_then(|e| e.value.clone())
    }

    /// Borrow the current value of `key` without cloning it.
    pub fn read<R>(
        &self,
        key: CacheKey,
        f: impl FnOnce(Option<&CacheValue>) -> R,
    ) -> R {
        let entries = self.entries.read();
        f(entries.get(&key).and_then(|e| e.value.as_ref()))
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.read(key, |value| value.is_some())
    }

    pub fn photos(&self, key: CacheKey) -> Vec<Photo> {
        self.read(key, |value| {
            value
                .and_then(CacheValue::as_photos)
                .map(<[Photo]>::to_vec)
                .unwrap_or_default()
        })
    }

    pub fn preferences(&self, section: Section) -> Option<PreferenceState> {
        self.read(CacheKey::Preferences(section), |value| {
            value.and_then(CacheValue::as_preferences).cloned()
        })
    }

    /// Bulk-set a key outside of any mutation.
    pub fn set(&self, key: CacheKey, value: CacheValue) {
        self.transact(&[key], ChangeKind::Seeded, |draft| {
            draft.put(key, Some(value));
        });
    }

    pub fn snapshot(&self, keys: &[CacheKey]) -> Snapshot {
        let entries = self.entries.read();
        Snapshot {
            values: keys
                .iter()
                .map(|key| {
                    (*key, entries.get(key).and_then(|e| e.value.clone()))
                })
                .collect(),
        }
    }

    /// Put every key of `snapshot` back exactly as captured.
    pub fn restore(&self, snapshot: &Snapshot) {
        let keys: Vec<CacheKey> = snapshot.keys().collect();
        self.transact(&keys, ChangeKind::RolledBack, |draft| {
            for key in snapshot.keys() {
                draft.put(key, snapshot.get(key).cloned());
            }
        });
    }

    /// Run `f` over a working copy of `keys` and write the result back atomically.
    pub fn transact(
        &self,
        keys: &[CacheKey],
        kind: ChangeKind,
        f: impl FnOnce(&mut Draft),
    ) {
        let changes = {
            let mut entries = self.entries.write();
            let mut draft = Draft {
                values: keys
                    .iter()
                    .map(|key| {
                        (*key, entries.get(key).and_then(|e| e.value.clone()))
                    })
                    .collect(),
            };
            f(&mut draft);

            let mut changes = Vec::new();
            for (key, value) in draft.values {
                let entry = entries.entry(key).or_default();
                if entry.value != value {
                    entry.value = value.clone();
                    changes.push(StoreChange { key, kind, value });
                }
            }
            changes
        };
        self.notify(&changes);
    }

    pub fn begin_mutation(&self, keys: &[CacheKey]) {
        let mut entries = self.entries.write();
        for key in keys {
            let entry = entries.entry(*key).or_default();
            entry.epoch += 1;
            entry.in_flight += 1;
        }
    }

    pub fn end_mutation(&self, keys: &[CacheKey]) {
        let mut entries = self.entries.write();
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                entry.in_flight = entry.in_flight.saturating_sub(1);
            }
        }
    }

    pub fn in_flight(&self, key: CacheKey) -> bool {
        self.entries
            .read()
            .get(&key)
            .is_some_and(|e| e.in_flight > 0)
    }

    /// `None` while a mutation holds the key; its settle revalidates instead.
    pub fn begin_refresh(&self, key: CacheKey) -> Option<RefreshTicket> {
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(entry) if entry.in_flight > 0 => None,
            Some(entry) => Some(RefreshTicket {
                key,
                epoch: entry.epoch,
            }),
            None => Some(RefreshTicket { key, epoch: 0 }),
        }
    }

    /// Write a refresh result unless a mutation started since the ticket was issued.
    pub fn complete_refresh(
        &self,
        ticket: RefreshTicket,
        value: CacheValue,
    ) -> bool {
        let change = {
            let mut entries = self.entries.write();
            let entry = entries.entry(ticket.key).or_default();
            if entry.epoch != ticket.epoch || entry.in_flight > 0 {
                log::debug!(
                    "[ProfileStore] Discarding stale refresh for {}",
                    ticket.key
                );
                return false;
            }
            entry.stale = false;
            if entry.value.as_ref() == Some(&value) {
                None
            } else {
                entry.value = Some(value.clone());
                Some(StoreChange {
                    key: ticket.key,
                    kind: ChangeKind::Refreshed,
                    value: Some(value),
                })
            }
        };
        if let Some(change) = change {
            self.notify(std::slice::from_ref(&change));
        }
        true
    }

    pub fn mark_stale(&self, keys: &[CacheKey]) {
        let mut entries = self.entries.write();
        for key in keys {
            entries.entry(*key).or_default().stale = true;
        }
    }

    pub fn is_stale(&self, key: CacheKey) -> bool {
        self.entries.read().get(&key).is_some_and(|e| e.stale)
    }

    fn notify(&self, changes: &[StoreChange]) {
        if changes.is_empty() {
            return;
        }
        let live: Vec<Arc<dyn StoreSubscriber>> = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for change in changes {
            for subscriber in &live {
                subscriber.on_store_changed(change);
            }
        }
    }
}
