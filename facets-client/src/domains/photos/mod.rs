//! Photo domain: upload, delete, set-primary and mount-time election.

pub mod election;
pub mod mutations;

use facets_model::{
    Photo, PhotoId, PhotoUpload, Section, SectionFlags, UploadPhotoRequest,
};

use crate::domains::ProfileEngine;
use crate::engine::identity::IdAliases;
use crate::engine::store::CacheKey;
use crate::error::{EngineError, EngineResult, ValidationError};

use self::election::{Election, elect};
use self::mutations::{DeleteMutation, SetPrimaryMutation, UploadMutation};

/// What a mount-time election pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// Collection is empty; the pass will run again once photos arrive
    NothingToElect,
    /// Already ran since the last mount
    AlreadyChecked,
    AlreadyPrimary(PhotoId),
    Elected(PhotoId),
    /// The set-primary call failed and was rolled back
    Failed(PhotoId),
}

impl ProfileEngine {
    /// Reject an upload before any mutation starts.
    pub fn validate_upload(
        &self,
        section: Section,
        upload: &PhotoUpload,
    ) -> Result<(), ValidationError> {
        let config = &self.inner.config;
        if !config
            .allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&upload.media_type))
        {
            return Err(ValidationError::UnsupportedType(
                upload.media_type.clone(),
            ));
        }
        if upload.is_empty() {
            return Err(ValidationError::Empty);
        }
        if upload.len() > config.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                size: upload.len(),
                max: config.max_upload_bytes,
            });
        }
        let held = self
            .inner
            .store
            .photos(CacheKey::SectionPhotos(section))
            .len();
        if held >= config.max_photos_per_section {
            return Err(ValidationError::SectionFull {
                section,
                capacity: config.max_photos_per_section,
            });
        }
        Ok(())
    }

    /// Upload a photo to `section`, returning its confirmed id.
    ///
    /// The photo shows up immediately under a temporary id. If it is the
    /// section's first photo it is provisionally primary, and once the server
    /// has confirmed it a separate set-primary call makes that durable.
    pub async fn upload(
        &self,
        section: Section,
        upload: PhotoUpload,
    ) -> EngineResult<PhotoId> {
        self.validate_upload(section, &upload)?;

        let inner = &self.inner;
        let _uploading = inner.activity.uploading(section);

        let photo = Photo {
            id: inner.ids.allocate(),
            owner_id: inner.owner,
            content: upload.inline_content(),
            primary: SectionFlags::default(),
            created_at: inner.time.utc_now(),
        };
        let request = UploadPhotoRequest {
            owner_id: inner.owner,
            section,
            media_type: upload.media_type.clone(),
            data: upload.encoded(),
        };
        let mutation = UploadMutation::new(
            inner.api.clone(),
            inner.aliases.clone(),
            section,
            photo,
            request,
        )
        .capped(inner.config.max_photos_per_section);
        log::debug!(
            "[Photos] Uploading {} as {} to {section}",
            upload.media_type,
            mutation.temporary_id()
        );

        let result = inner.coordinator.run(&mutation).await;
        if let Ok(uploaded) = &result
            && mutation.took_primary()
        {
            let follow_up = SetPrimaryMutation::new(
                inner.api.clone(),
                inner.aliases.clone(),
                uploaded.id,
                section,
            )
            .background("primary-after-upload");
            if let Err(e) = inner.coordinator.run(&follow_up).await {
                log::warn!(
                    "[Photos] Could not confirm {} as primary for {section}: {e}",
                    uploaded.id
                );
            }
        }

        self.settled(&[CacheKey::AllPhotos, CacheKey::SectionPhotos(section)]);
        result.map(|uploaded| uploaded.id)
    }

    /// Remove a photo everywhere it is listed.
    ///
    /// Photos that were never confirmed are dropped without a server call.
    pub async fn remove(&self, id: PhotoId) -> EngineResult<()> {
        let inner = &self.inner;
        let keys = self.keys_listing(id, &inner.aliases);
        if keys.len() == 1 && !self.pool_lists(id, &inner.aliases) {
            return Err(EngineError::UnknownPhoto(id));
        }

        let _deleting = inner.activity.deleting(id);
        let mutation = DeleteMutation::new(
            inner.api.clone(),
            inner.aliases.clone(),
            id,
            keys.clone(),
        );
        let result = inner.coordinator.run(&mutation).await;
        self.settled(&keys);
        result
    }

    /// Make `id` the single primary photo of `section`.
    pub async fn make_primary(
        &self,
        section: Section,
        id: PhotoId,
    ) -> EngineResult<()> {
        let inner = &self.inner;
        let resolved = inner.aliases.resolve(id);
        let listed = inner
            .store
            .photos(CacheKey::SectionPhotos(section))
            .iter()
            .any(|photo| photo.id == id || photo.id == resolved);
        if !listed {
            return Err(EngineError::UnknownPhoto(id));
        }

        let mutation = SetPrimaryMutation::new(
            inner.api.clone(),
            inner.aliases.clone(),
            id,
            section,
        );
        let result = inner.coordinator.run(&mutation).await;
        self.settled(&[CacheKey::AllPhotos, CacheKey::SectionPhotos(section)]);
        result.map(|_| ())
    }

    /// Mount-time repair of the one-primary invariant.
    ///
    /// Runs at most once per section between mounts. A failed election is
    /// logged, not reported, and is not retried until the next mount.
    pub async fn ensure_primary(&self, section: Section) -> ElectionOutcome {
        let inner = &self.inner;
        if inner.elections.is_checked(section) {
            return ElectionOutcome::AlreadyChecked;
        }

        let photos = inner.store.photos(CacheKey::SectionPhotos(section));
        let candidate = match elect(&photos, section) {
            Election::Empty => return ElectionOutcome::NothingToElect,
            Election::Settled(id) => {
                inner.elections.mark_checked(section);
                return ElectionOutcome::AlreadyPrimary(id);
            }
            Election::Elect(id) => id,
        };
        if !inner.elections.mark_checked(section) {
            return ElectionOutcome::AlreadyChecked;
        }

        log::debug!("[Photos] Electing {candidate} as primary for {section}");
        let mutation = SetPrimaryMutation::new(
            inner.api.clone(),
            inner.aliases.clone(),
            candidate,
            section,
        )
        .background("elect-primary");
        let outcome = match inner.coordinator.run(&mutation).await {
            Ok(_) => ElectionOutcome::Elected(candidate),
            Err(e) => {
                log::warn!(
                    "[Photos] Primary election for {section} failed: {e}"
                );
                ElectionOutcome::Failed(candidate)
            }
        };
        self.settled(&[CacheKey::AllPhotos, CacheKey::SectionPhotos(section)]);
        outcome
    }

    /// Global pool plus every section collection listing `id`.
    fn keys_listing(&self, id: PhotoId, aliases: &IdAliases) -> Vec<CacheKey> {
        let resolved = aliases.resolve(id);
        let mut keys = vec![CacheKey::AllPhotos];
        keys.extend(
            Section::ALL
                .iter()
                .map(|section| CacheKey::SectionPhotos(*section))
                .filter(|key| {
                    self.inner
                        .store
                        .photos(*key)
                        .iter()
                        .any(|photo| photo.id == id || photo.id == resolved)
                }),
        );
        keys
    }

    fn pool_lists(&self, id: PhotoId, aliases: &IdAliases) -> bool {
        let resolved = aliases.resolve(id);
        self.inner
            .store
            .photos(CacheKey::AllPhotos)
            .iter()
            .any(|photo| photo.id == id || photo.id == resolved)
    }
}
