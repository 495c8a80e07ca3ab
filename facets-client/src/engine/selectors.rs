//! Read model over the profile store.
//!
//! Selectors are pure functions of the current store state. None of them
//! writes to the store or starts a mutation; primary election lives in the
//! photo domain and runs from a mount-time hook.

use facets_model::{Photo, PreferenceMap, Section};

use crate::engine::store::{CacheKey, CacheValue, ProfileStore};

/// A capped, stable-ordered slice of a section's photos
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub has_more: bool,
}

pub fn primary_photo(store: &ProfileStore, section: Section) -> Option<Photo> {
    store.read(CacheKey::SectionPhotos(section), |value| {
        value
            .and_then(CacheValue::as_photos)?
            .iter()
            .find(|photo| photo.is_primary_for(section))
            .cloned()
    })
}

pub fn primary_photo_url(
    store: &ProfileStore,
    section: Section,
) -> Option<String> {
    primary_photo(store, section).map(|photo| photo.content.source())
}

pub fn display_photos(
    store: &ProfileStore,
    section: Section,
    page_size: usize,
) -> PhotoPage {
    store.read(CacheKey::SectionPhotos(section), |value| {
        let photos = value.and_then(CacheValue::as_photos).unwrap_or(&[]);
        PhotoPage {
            photos: photos.iter().take(page_size).cloned().collect(),
            has_more: photos.len() > page_size,
        }
    })
}

/// Live map once the record exists; before that, the defaults with any
/// toggles retained for the creation payload written over them.
pub fn effective_preferences(
    store: &ProfileStore,
    section: Section,
    defaults: &PreferenceMap,
) -> PreferenceMap {
    match store.preferences(section) {
        Some(state) if state.record_exists() => state.map,
        Some(state) => state.map.overlaid_on(defaults),
        None => defaults.clone(),
    }
}
