//! Profile service trait
//!
//! The engine treats every call as an opaque async operation that either
//! returns a parsed response or fails; timeouts belong to the transport.

use async_trait::async_trait;
use facets_model::{
    Photo, PhotoId, PreferencesRecord, Section, SerializedPreferences,
    SetPrimaryResponse, UploadPhotoRequest, UploadedPhoto,
};
use std::fmt::Debug;

use crate::error::ApiResult;

#[async_trait]
pub trait ProfileApi: Send + Sync + Debug {
    async fn upload_photo(
        &self,
        request: UploadPhotoRequest,
    ) -> ApiResult<UploadedPhoto>;

    /// Only ever called with confirmed ids
    async fn delete_photo(&self, id: PhotoId) -> ApiResult<()>;

    async fn set_primary(
        &self,
        id: PhotoId,
        section: Section,
    ) -> ApiResult<SetPrimaryResponse>;

    async fn patch_preferences(
        &self,
        section: Section,
        preferences: SerializedPreferences,
    ) -> ApiResult<()>;

    async fn get_photos(&self, section: Section) -> ApiResult<Vec<Photo>>;

    /// `None` while the section's profile record does not exist yet
    async fn get_preferences(
        &self,
        section: Section,
    ) -> ApiResult<Option<PreferencesRecord>>;
}
