//! Primary election policy.
//!
//! A non-empty section must end up with exactly one primary photo. The
//! policy itself is pure: it looks at the collection in its current order
//! and names the photo that should hold the flag. Applying that decision is
//! the engine's job, through an ordinary set-primary mutation.

use std::collections::HashSet;

use facets_model::{Photo, PhotoId, Section};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Election {
    /// Nothing to elect from
    Empty,
    /// Exactly one photo already holds the flag
    Settled(PhotoId),
    /// The flag should move to (or be confirmed on) this photo
    Elect(PhotoId),
}

pub fn elect(photos: &[Photo], section: Section) -> Election {
    let Some(first) = photos.first() else {
        return Election::Empty;
    };
    let mut primaries = photos.iter().filter(|photo| photo.is_primary_for(section));
    match (primaries.next(), primaries.next()) {
        (Some(only), None) => Election::Settled(only.id),
        // Inconsistent import: keep the first flagged photo.
        (Some(keep), Some(_)) => Election::Elect(keep.id),
        (None, _) => Election::Elect(first.id),
    }
}

/// Per-section "already checked" flags.
///
/// A flag is only set once a non-empty collection has been looked at, and
/// only cleared by an explicit re-mount. A failed election leaves it set.
#[derive(Debug, Default)]
pub struct ElectionGuard {
    checked: Mutex<HashSet<Section>>,
}

impl ElectionGuard {
    pub fn is_checked(&self, section: Section) -> bool {
        self.checked.lock().contains(&section)
    }

    /// Returns false if the section was already checked.
    pub fn mark_checked(&self, section: Section) -> bool {
        self.checked.lock().insert(section)
    }

    pub fn reset(&self, section: Section) {
        self.checked.lock().remove(&section);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use facets_model::{PhotoContent, SectionFlags, UserId};

    fn photo(id: i64, flags: SectionFlags) -> Photo {
        Photo {
            id: PhotoId(id),
            owner_id: UserId::new(),
            content: PhotoContent::Stored {
                url: format!("https://cdn.test/{id}.jpg"),
            },
            primary: flags,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_in_current_order_wins_when_nobody_is_primary() {
        let none = SectionFlags::default();
        let photos = vec![photo(7, none), photo(3, none)];
        assert_eq!(elect(&photos, Section::Job), Election::Elect(PhotoId(7)));
        assert_eq!(elect(&[], Section::Job), Election::Empty);
    }

    #[test]
    fn flags_of_other_sections_do_not_count() {
        let meet = SectionFlags::default().with(Section::Meet, true);
        let job = SectionFlags::default().with(Section::Job, true);
        let photos = vec![photo(1, meet), photo(2, job)];
        assert_eq!(elect(&photos, Section::Job), Election::Settled(PhotoId(2)));
        assert_eq!(elect(&photos, Section::Meet), Election::Settled(PhotoId(1)));
        assert_eq!(
            elect(&photos, Section::Networking),
            Election::Elect(PhotoId(1))
        );
    }

    #[test]
    fn duplicate_primaries_keep_the_first_flagged() {
        let job = SectionFlags::default().with(Section::Job, true);
        let photos = vec![photo(1, SectionFlags::default()), photo(2, job), photo(3, job)];
        assert_eq!(elect(&photos, Section::Job), Election::Elect(PhotoId(2)));
    }

    #[test]
    fn guard_is_cleared_only_by_reset() {
        let guard = ElectionGuard::default();
        assert!(guard.mark_checked(Section::Job));
        assert!(!guard.mark_checked(Section::Job));
        assert!(!guard.is_checked(Section::Meet));
        guard.reset(Section::Job);
        assert!(!guard.is_checked(Section::Job));
    }
}
