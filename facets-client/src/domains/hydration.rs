//! Loading and revalidating store keys from the profile service.
//!
//! Every read goes through a refresh ticket. Keys held by a mutation or an
//! open preference burst are skipped (their settle revalidates them later),
//! and a result is dropped if a mutation began on its key while the request
//! was out.

use facets_model::{Photo, PhotoId, PreferenceMap, Section};

use crate::domains::ProfileEngine;
use crate::engine::store::{CacheKey, CacheValue, PreferenceState};
use crate::error::EngineResult;

impl ProfileEngine {
    /// Load one section's photos and preferences.
    pub async fn hydrate(&self, section: Section) -> EngineResult<()> {
        self.revalidate(&[
            CacheKey::SectionPhotos(section),
            CacheKey::Preferences(section),
        ])
        .await
    }

    pub async fn hydrate_all(&self) -> EngineResult<()> {
        let keys: Vec<CacheKey> = Section::ALL
            .iter()
            .flat_map(|section| {
                [
                    CacheKey::SectionPhotos(*section),
                    CacheKey::Preferences(*section),
                ]
            })
            .collect();
        self.revalidate(&keys).await
    }

    /// Re-read `keys` from the server. The global pool is rebuilt from the
    /// section collections rather than fetched.
    pub async fn revalidate(&self, keys: &[CacheKey]) -> EngineResult<()> {
        let inner = &self.inner;
        let store = &inner.store;

        let touches_photos = keys
            .iter()
            .any(|key| matches!(key, CacheKey::SectionPhotos(_)));
        let pool_ticket = if touches_photos {
            store.begin_refresh(CacheKey::AllPhotos)
        } else {
            None
        };

        let mut vanished: Vec<PhotoId> = Vec::new();
        let mut refreshed_photos = false;

        for key in keys {
            let Some(ticket) = store.begin_refresh(*key) else {
                log::debug!("[Hydration] {key} is busy, skipping refresh");
                continue;
            };

            match *key {
                CacheKey::SectionPhotos(section) => {
                    let photos = inner.api.get_photos(section).await?;
                    if !self.is_mounted() {
                        return Ok(());
                    }
                    let previous = store.photos(*key);
                    if store.complete_refresh(ticket, CacheValue::Photos(photos.clone())) {
                        refreshed_photos = true;
                        vanished.extend(
                            previous
                                .iter()
                                .map(|photo| photo.id)
                                .filter(|id| !photos.iter().any(|p| p.id == *id)),
                        );
                    }
                }
                CacheKey::Preferences(section) => {
                    let record = inner.api.get_preferences(section).await?;
                    if !self.is_mounted() {
                        return Ok(());
                    }
                    let state = match record {
                        Some(record) => PreferenceState {
                            record: Some(record.record_id),
                            map: PreferenceMap::deserialize(&record.preferences)?,
                        },
                        // Keep toggles retained for the creation payload.
                        None => PreferenceState {
                            record: None,
                            map: store
                                .preferences(section)
                                .filter(|state| !state.record_exists())
                                .map(|state| state.map)
                                .unwrap_or_default(),
                        },
                    };
                    let found = state.record_exists();
                    if store.complete_refresh(ticket, CacheValue::Preferences(state))
                        && found
                    {
                        self.replay_deferred(section);
                    }
                }
                CacheKey::AllPhotos => {}
            }
        }

        if let Some(ticket) = pool_ticket.filter(|_| refreshed_photos) {
            let sections: Vec<Vec<Photo>> = Section::ALL
                .iter()
                .filter(|section| store.contains(CacheKey::SectionPhotos(**section)))
                .map(|section| store.photos(CacheKey::SectionPhotos(*section)))
                .collect();
            let pool = merge_pool(
                store.photos(CacheKey::AllPhotos),
                &vanished,
                &sections,
            );
            store.complete_refresh(ticket, CacheValue::Photos(pool));
        }
        Ok(())
    }
}

/// Bring the global pool in line with freshly read section collections.
///
/// Photos that dropped out of a refreshed section and are not listed by any
/// other section leave the pool. Every section photo is upserted by id,
/// keeping the pool's existing order.
fn merge_pool(
    pool: Vec<Photo>,
    vanished: &[PhotoId],
    sections: &[Vec<Photo>],
) -> Vec<Photo> {
    let listed = |id: PhotoId| sections.iter().flatten().any(|p| p.id == id);

    let mut merged: Vec<Photo> = pool
        .into_iter()
        .filter(|photo| !vanished.contains(&photo.id) || listed(photo.id))
        .collect();

    for photo in sections.iter().flatten() {
        match merged.iter_mut().find(|p| p.id == photo.id) {
            Some(slot) => *slot = photo.clone(),
            None => merged.push(photo.clone()),
        }
    }
    merged
}
