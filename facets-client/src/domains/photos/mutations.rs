//! Photo writes expressed as optimistic mutations.
//!
//! Photos live in two places at once: the owner's global pool and each
//! section collection that lists them. Every mutation here declares all the
//! keys it touches so the coordinator updates them in one step.
//!
//! Delete and set-primary resolve their target through [`IdAliases`] inside
//! `apply`: when they were queued behind the upload that created the photo,
//! the temporary id they were issued with has been confirmed by then.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use facets_model::{
    Photo, PhotoContent, PhotoId, Section, SetPrimaryResponse,
    UploadPhotoRequest, UploadedPhoto,
};
use parking_lot::Mutex;

use crate::engine::coordinator::{FailurePolicy, OptimisticMutation};
use crate::engine::identity::{IdAliases, is_temporary};
use crate::engine::store::{CacheKey, CacheValue, Draft, Snapshot};
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::infra::services::profile_api::ProfileApi;

#[derive(Debug)]
pub struct UploadMutation {
    api: Arc<dyn ProfileApi>,
    aliases: Arc<IdAliases>,
    section: Section,
    photo: Photo,
    request: UploadPhotoRequest,
    capacity: Option<usize>,
    took_primary: AtomicBool,
}

impl UploadMutation {
    /// `photo` is the optimistic entity; it must carry a temporary id.
    pub fn new(
        api: Arc<dyn ProfileApi>,
        aliases: Arc<IdAliases>,
        section: Section,
        photo: Photo,
        request: UploadPhotoRequest,
    ) -> Self {
        Self {
            api,
            aliases,
            section,
            photo,
            request,
            capacity: None,
            took_primary: AtomicBool::new(false),
        }
    }

    /// Refuse to run once the section already holds `capacity` photos.
    pub fn capped(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn temporary_id(&self) -> PhotoId {
        self.photo.id
    }

    /// Whether the upload landed in an empty section and provisionally
    /// became its primary photo.
    pub fn took_primary(&self) -> bool {
        self.took_primary.load(Ordering::Acquire)
    }
}

#[async_trait]
impl OptimisticMutation for UploadMutation {
    type Confirmed = UploadedPhoto;

    fn label(&self) -> &'static str {
        "upload-photo"
    }

    fn keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::AllPhotos, CacheKey::SectionPhotos(self.section)]
    }

    // Earlier writes on the section may have settled while this one queued.
    fn admit(&self, current: &Snapshot) -> EngineResult<()> {
        let Some(capacity) = self.capacity else {
            return Ok(());
        };
        let held = current
            .get(CacheKey::SectionPhotos(self.section))
            .and_then(CacheValue::as_photos)
            .map_or(0, <[Photo]>::len);
        if held >= capacity {
            return Err(ValidationError::SectionFull {
                section: self.section,
                capacity,
            }
            .into());
        }
        Ok(())
    }

    fn apply(&self, draft: &mut Draft) {
        let section_key = CacheKey::SectionPhotos(self.section);
        let mut photo = self.photo.clone();
        let first = draft.photos(section_key).is_empty();
        if first {
            photo.primary.set(self.section, true);
        }
        self.took_primary.store(first, Ordering::Release);

        draft.update_photos(section_key, |photos| photos.push(photo.clone()));
        draft.update_photos(CacheKey::AllPhotos, |photos| {
            if !photos.iter().any(|p| p.id == photo.id) {
                photos.push(photo);
            }
        });
    }

    async fn commit(&self) -> EngineResult<UploadedPhoto> {
        Ok(self.api.upload_photo(self.request.clone()).await?)
    }

    // Matched by temporary id, never by content.
    fn reconcile(&self, draft: &mut Draft, confirmed: &UploadedPhoto) {
        let temporary = self.photo.id;
        self.aliases.record(temporary, confirmed.id);
        for key in self.keys() {
            draft.update_photos(key, |photos| {
                for photo in photos.iter_mut().filter(|p| p.id == temporary) {
                    photo.id = confirmed.id;
                    photo.content = PhotoContent::Stored {
                        url: confirmed.url.clone(),
                    };
                    photo.created_at = confirmed.created_at;
                }
            });
        }
    }
}

#[derive(Debug)]
pub struct DeleteMutation {
    api: Arc<dyn ProfileApi>,
    aliases: Arc<IdAliases>,
    requested: PhotoId,
    keys: Vec<CacheKey>,
    target: Mutex<PhotoId>,
}

impl DeleteMutation {
    /// `keys` are the global pool plus every section listing the photo.
    pub fn new(
        api: Arc<dyn ProfileApi>,
        aliases: Arc<IdAliases>,
        id: PhotoId,
        keys: Vec<CacheKey>,
    ) -> Self {
        Self {
            api,
            aliases,
            requested: id,
            keys,
            target: Mutex::new(id),
        }
    }
}

#[async_trait]
impl OptimisticMutation for DeleteMutation {
    type Confirmed = ();

    fn label(&self) -> &'static str {
        "delete-photo"
    }

    fn keys(&self) -> Vec<CacheKey> {
        self.keys.clone()
    }

    fn apply(&self, draft: &mut Draft) {
        let id = self.aliases.resolve(self.requested);
        *self.target.lock() = id;
        for key in &self.keys {
            draft.update_photos(*key, |photos| {
                photos.retain(|p| p.id != id && p.id != self.requested)
            });
        }
    }

    async fn commit(&self) -> EngineResult<()> {
        let id = *self.target.lock();
        if is_temporary(id) {
            log::debug!("[Photos] {id} was never confirmed, dropping locally");
            return Ok(());
        }
        self.api.delete_photo(id).await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetPrimaryMutation {
    api: Arc<dyn ProfileApi>,
    aliases: Arc<IdAliases>,
    requested: PhotoId,
    section: Section,
    /// Resolved target, `None` if the section no longer lists it
    target: Mutex<Option<PhotoId>>,
    label: &'static str,
    policy: FailurePolicy,
}

impl SetPrimaryMutation {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        aliases: Arc<IdAliases>,
        id: PhotoId,
        section: Section,
    ) -> Self {
        Self {
            api,
            aliases,
            requested: id,
            section,
            target: Mutex::new(None),
            label: "set-primary",
            policy: FailurePolicy::Notify,
        }
    }

    /// Engine-initiated repair: logged under `label`, never surfaced.
    pub fn background(mut self, label: &'static str) -> Self {
        self.label = label;
        self.policy = FailurePolicy::Silent;
        self
    }
}

#[async_trait]
impl OptimisticMutation for SetPrimaryMutation {
    type Confirmed = SetPrimaryResponse;

    fn label(&self) -> &'static str {
        self.label
    }

    fn keys(&self) -> Vec<CacheKey> {
        vec![CacheKey::AllPhotos, CacheKey::SectionPhotos(self.section)]
    }

    fn apply(&self, draft: &mut Draft) {
        let id = self.aliases.resolve(self.requested);
        let section_key = CacheKey::SectionPhotos(self.section);
        let listed = draft.photos(section_key).iter().any(|p| p.id == id);
        *self.target.lock() = listed.then_some(id);
        if !listed {
            // Gone by the time we got the lock; commit reports it.
            return;
        }
        let section = self.section;
        for key in self.keys() {
            draft.update_photos(key, |photos| {
                for photo in photos.iter_mut() {
                    photo.primary.set(section, photo.id == id);
                }
            });
        }
    }

    async fn commit(&self) -> EngineResult<SetPrimaryResponse> {
        let target = *self.target.lock();
        match target {
            Some(id) if !is_temporary(id) => {
                Ok(self.api.set_primary(id, self.section).await?)
            }
            _ => Err(EngineError::UnknownPhoto(self.requested)),
        }
    }

    /// The server's list is authoritative; it may apply rules of its own.
    fn reconcile(&self, draft: &mut Draft, confirmed: &SetPrimaryResponse) {
        draft.update_photos(CacheKey::SectionPhotos(self.section), |photos| {
            *photos = confirmed.photos.clone();
        });
        draft.update_photos(CacheKey::AllPhotos, |photos| {
            for photo in photos.iter_mut() {
                if let Some(server) =
                    confirmed.photos.iter().find(|p| p.id == photo.id)
                {
                    *photo = server.clone();
                }
            }
        });
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }
}
