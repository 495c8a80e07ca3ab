//! In-memory profile service.
//!
//! Behaves like the real endpoints closely enough for engine tests: ids are
//! issued from a counter, uploads join the requested section, set-primary
//! returns the section's authoritative list. Every call is recorded before
//! it is answered, so a test can observe requests that are still held at a
//! gate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facets_model::{
    Photo, PhotoContent, PhotoId, PreferenceMap, PreferencesRecord, RecordId,
    Section, SectionFlags, SerializedPreferences, SetPrimaryResponse,
    UploadPhotoRequest, UploadedPhoto, UserId,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Semaphore;

use crate::error::{ApiError, ApiResult};
use crate::infra::services::profile_api::ProfileApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    Upload,
    Delete,
    SetPrimary,
    PatchPreferences,
    GetPhotos,
    GetPreferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Upload { section: Section, media_type: String },
    Delete(PhotoId),
    SetPrimary(PhotoId, Section),
    PatchPreferences(Section, PreferenceMap),
    GetPhotos(Section),
    GetPreferences(Section),
}

impl ApiCall {
    pub fn op(&self) -> ApiOp {
        match self {
            ApiCall::Upload { .. } => ApiOp::Upload,
            ApiCall::Delete(_) => ApiOp::Delete,
            ApiCall::SetPrimary(..) => ApiOp::SetPrimary,
            ApiCall::PatchPreferences(..) => ApiOp::PatchPreferences,
            ApiCall::GetPhotos(_) => ApiOp::GetPhotos,
            ApiCall::GetPreferences(_) => ApiOp::GetPreferences,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Network,
    Conflict,
}

impl Failure {
    fn into_error(self, op: ApiOp) -> ApiError {
        match self {
            Failure::Network => ApiError::Status {
                status: 503,
                message: format!("{op:?} unavailable"),
            },
            Failure::Conflict => {
                ApiError::Conflict(format!("{op:?} rejected: state moved on"))
            }
        }
    }
}

#[derive(Debug)]
struct Inner {
    owner: UserId,
    next_id: i64,
    now: DateTime<Utc>,
    photos: Vec<Photo>,
    sections: HashMap<Section, Vec<PhotoId>>,
    preferences: HashMap<Section, PreferencesRecord>,
    calls: Vec<ApiCall>,
    failures: HashMap<ApiOp, Failure>,
}

impl Inner {
    fn section_photos(&self, section: Section) -> Vec<Photo> {
        self.sections
            .get(&section)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        self.photos.iter().find(|photo| photo.id == *id)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn issue_id(&mut self) -> PhotoId {
        let id = PhotoId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub struct TestProfileApi {
    inner: Arc<RwLock<Inner>>,
    gates: Arc<Mutex<HashMap<ApiOp, Arc<Semaphore>>>>,
}

impl Default for TestProfileApi {
    fn default() -> Self {
        Self::new(UserId::new())
    }
}

impl TestProfileApi {
    pub fn new(owner: UserId) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                owner,
                next_id: 1,
                now: Utc::now(),
                photos: Vec::new(),
                sections: HashMap::new(),
                preferences: HashMap::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
            })),
            gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Next confirmed id the server will issue.
    pub fn with_next_id(self, next_id: i64) -> Self {
        self.inner.write().next_id = next_id;
        self
    }

    pub fn owner(&self) -> UserId {
        self.inner.read().owner
    }

    /// Store a confirmed photo in `section` and return it.
    pub fn add_photo(&self, section: Section, primary: bool) -> Photo {
        let mut inner = self.inner.write();
        let id = inner.issue_id();
        let mut flags = SectionFlags::default();
        flags.set(section, primary);
        inner.now += chrono::Duration::seconds(1);
        let photo = Photo {
            id,
            owner_id: inner.owner,
            content: PhotoContent::Stored {
                url: format!("https://cdn.test/photos/{id}.jpg"),
            },
            primary: flags,
            created_at: inner.now,
        };
        inner.photos.push(photo.clone());
        inner.sections.entry(section).or_default().push(id);
        photo
    }

    /// Attach an existing photo to another section.
    pub fn share_photo(&self, id: PhotoId, section: Section) {
        let mut inner = self.inner.write();
        let ids = inner.sections.entry(section).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn seed_preferences(
        &self,
        section: Section,
        record_id: RecordId,
        map: &PreferenceMap,
    ) {
        self.inner.write().preferences.insert(
            section,
            PreferencesRecord {
                record_id,
                preferences: map.serialize(),
            },
        );
    }

    /// Server-side photos of `section`, in membership order.
    pub fn photos(&self, section: Section) -> Vec<Photo> {
        self.inner.read().section_photos(section)
    }

    pub fn stored_preferences(&self, section: Section) -> Option<PreferenceMap> {
        self.inner
            .read()
            .preferences
            .get(&section)
            .and_then(|record| {
                PreferenceMap::deserialize(&record.preferences).ok()
            })
    }

    /// The next call of `op` fails like an unreachable server.
    pub fn fail_next(&self, op: ApiOp) {
        self.inner.write().failures.insert(op, Failure::Network);
    }

    /// The next call of `op` is rejected as a conflict.
    pub fn conflict_next(&self, op: ApiOp) {
        self.inner.write().failures.insert(op, Failure::Conflict);
    }

    /// Hold every call of `op` until [`release`](Self::release) lets it through.
    pub fn pause(&self, op: ApiOp) {
        self.gates.lock().insert(op, Arc::new(Semaphore::new(0)));
    }

    /// Let one held (or future) call of `op` proceed.
    pub fn release(&self, op: ApiOp) {
        if let Some(gate) = self.gates.lock().get(&op) {
            gate.add_permits(1);
        }
    }

    /// Remove the gate for `op`, letting everything through.
    pub fn resume(&self, op: ApiOp) {
        if let Some(gate) = self.gates.lock().remove(&op) {
            gate.close();
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.read().calls.clone()
    }

    pub fn calls_of(&self, op: ApiOp) -> Vec<ApiCall> {
        self.inner
            .read()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .cloned()
            .collect()
    }

    /// Calls that write, in order. Reads from revalidation are left out.
    pub fn writes(&self) -> Vec<ApiCall> {
        self.inner
            .read()
            .calls
            .iter()
            .filter(|call| {
                !matches!(call.op(), ApiOp::GetPhotos | ApiOp::GetPreferences)
            })
            .cloned()
            .collect()
    }

    async fn enter(&self, call: ApiCall) -> ApiResult<()> {
        let op = call.op();
        self.inner.write().calls.push(call);

        let gate = self.gates.lock().get(&op).cloned();
        if let Some(gate) = gate {
            // A closed gate means resume() was called while we waited.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        match self.inner.write().failures.remove(&op) {
            Some(failure) => Err(failure.into_error(op)),
            None => Ok(()),
        }
    }
}

fn not_found(what: impl std::fmt::Display) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl ProfileApi for TestProfileApi {
    async fn upload_photo(
        &self,
        request: UploadPhotoRequest,
    ) -> ApiResult<UploadedPhoto> {
        self.enter(ApiCall::Upload {
            section: request.section,
            media_type: request.media_type.clone(),
        })
        .await?;

        let mut inner = self.inner.write();
        let id = inner.issue_id();
        inner.now += chrono::Duration::seconds(1);
        let url = format!("https://cdn.test/photos/{id}.jpg");
        let photo = Photo {
            id,
            owner_id: request.owner_id,
            content: PhotoContent::Stored { url: url.clone() },
            primary: SectionFlags::default(),
            created_at: inner.now,
        };
        inner.photos.push(photo);
        inner.sections.entry(request.section).or_default().push(id);

        Ok(UploadedPhoto {
            id,
            url,
            created_at: inner.now,
        })
    }

    async fn delete_photo(&self, id: PhotoId) -> ApiResult<()> {
        self.enter(ApiCall::Delete(id)).await?;

        let mut inner = self.inner.write();
        let before = inner.photos.len();
        inner.photos.retain(|photo| photo.id != id);
        if inner.photos.len() == before {
            return Err(not_found(format!("photo {id}")));
        }
        for ids in inner.sections.values_mut() {
            ids.retain(|member| *member != id);
        }
        Ok(())
    }

    async fn set_primary(
        &self,
        id: PhotoId,
        section: Section,
    ) -> ApiResult<SetPrimaryResponse> {
        self.enter(ApiCall::SetPrimary(id, section)).await?;

        let mut inner = self.inner.write();
        let members = inner.sections.get(&section).cloned().unwrap_or_default();
        if !members.contains(&id) {
            return Err(not_found(format!("photo {id} in {section}")));
        }
        for photo in inner.photos.iter_mut() {
            if members.contains(&photo.id) {
                photo.primary.set(section, photo.id == id);
            }
        }
        Ok(SetPrimaryResponse {
            photos: inner.section_photos(section),
        })
    }

    async fn patch_preferences(
        &self,
        section: Section,
        preferences: SerializedPreferences,
    ) -> ApiResult<()> {
        let map = PreferenceMap::deserialize(&preferences)
            .map_err(|e| ApiError::Other(e.to_string()))?;
        self.enter(ApiCall::PatchPreferences(section, map)).await?;

        let mut inner = self.inner.write();
        match inner.preferences.get_mut(&section) {
            Some(record) => {
                record.preferences = preferences;
                Ok(())
            }
            None => Err(not_found(format!("{section} profile"))),
        }
    }

    async fn get_photos(&self, section: Section) -> ApiResult<Vec<Photo>> {
        self.enter(ApiCall::GetPhotos(section)).await?;
        Ok(self.inner.read().section_photos(section))
    }

    async fn get_preferences(
        &self,
        section: Section,
    ) -> ApiResult<Option<PreferencesRecord>> {
        self.enter(ApiCall::GetPreferences(section)).await?;
        Ok(self.inner.read().preferences.get(&section).cloned())
    }
}
