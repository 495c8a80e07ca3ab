//! Generic optimistic-write machinery shared by the photo and preference domains.

pub mod coordinator;
pub mod identity;
pub mod selectors;
pub mod store;

pub use coordinator::{
    Coordinator, FailurePolicy, KeyLocks, Liveness, OptimisticMutation,
};
pub use identity::{IdAliases, TemporaryIds, is_temporary};
pub use store::{
    CacheKey, CacheValue, ChangeKind, Draft, PreferenceState, ProfileStore,
    RefreshTicket, Snapshot, StoreChange, StoreSubscriber,
};
