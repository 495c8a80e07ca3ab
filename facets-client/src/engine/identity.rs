//! Client-local photo identities.
//!
//! Temporary ids are drawn from a counter seeded with wall-clock milliseconds,
//! which already sits far above [`CONFIRMED_ID_CEILING`]. The seed is clamped
//! anyway so a skewed clock can never hand out an id the server could issue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use facets_model::{CONFIRMED_ID_CEILING, PhotoId};
use parking_lot::RwLock;

/// Whether `id` was allocated locally and never confirmed.
///
/// Deletes of temporary photos never reach the network.
pub fn is_temporary(id: PhotoId) -> bool {
    id.is_temporary()
}

#[derive(Debug)]
pub struct TemporaryIds {
    next: AtomicI64,
}

impl TemporaryIds {
    pub fn seeded(unix_millis: i64) -> Self {
        Self {
            next: AtomicI64::new(unix_millis.max(CONFIRMED_ID_CEILING + 1)),
        }
    }

    /// Strictly increasing for the lifetime of this allocator.
    pub fn allocate(&self) -> PhotoId {
        PhotoId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Remembers which confirmed id a temporary id turned into.
///
/// Collections never keep the temporary id once an upload reconciles; this
/// table only lets late requests that still carry it find the right photo.
#[derive(Debug, Default)]
pub struct IdAliases {
    confirmed: RwLock<HashMap<PhotoId, PhotoId>>,
}

impl IdAliases {
    pub fn record(&self, temporary: PhotoId, confirmed: PhotoId) {
        self.confirmed.write().insert(temporary, confirmed);
    }

    pub fn resolve(&self, id: PhotoId) -> PhotoId {
        if !id.is_temporary() {
            return id;
        }
        self.confirmed.read().get(&id).copied().unwrap_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_ids_sit_above_the_ceiling_and_increase() {
        let ids = TemporaryIds::seeded(1_700_000_000_000);
        let first = ids.allocate();
        let second = ids.allocate();
        assert!(is_temporary(first));
        assert!(second > first);
    }

    #[test]
    fn skewed_clock_seed_is_clamped() {
        let ids = TemporaryIds::seeded(5);
        let id = ids.allocate();
        assert_eq!(id, PhotoId(CONFIRMED_ID_CEILING + 1));
        assert!(is_temporary(id));
    }

    #[test]
    fn aliases_resolve_only_temporary_ids() {
        let aliases = IdAliases::default();
        let temp = PhotoId(CONFIRMED_ID_CEILING + 10);
        assert_eq!(aliases.resolve(temp), temp);

        aliases.record(temp, PhotoId(42));
        assert_eq!(aliases.resolve(temp), PhotoId(42));
        assert_eq!(aliases.resolve(PhotoId(7)), PhotoId(7));
    }
}
