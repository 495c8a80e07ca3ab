use async_trait::async_trait;
use facets_model::api::routes::{replace_param, v1};
use facets_model::{
    PatchPreferencesRequest, Photo, PhotoId, PreferencesRecord, Section,
    SerializedPreferences, SetPrimaryResponse, UploadPhotoRequest,
    UploadedPhoto,
};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::infra::api_client::ApiClient;
use crate::infra::services::profile_api::ProfileApi;

/// [`ProfileApi`] over the JSON REST endpoints
#[derive(Clone, Debug)]
pub struct HttpProfileApi {
    client: Arc<ApiClient>,
}

impl HttpProfileApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileApi for HttpProfileApi {
    async fn upload_photo(
        &self,
        request: UploadPhotoRequest,
    ) -> ApiResult<UploadedPhoto> {
        let path =
            replace_param(v1::SECTION_PHOTOS, "{section}", request.section.as_str());
        self.client.post(&path, &request).await
    }

    async fn delete_photo(&self, id: PhotoId) -> ApiResult<()> {
        let path = replace_param(v1::PHOTO_ITEM, "{id}", id.to_string());
        self.client.delete_no_content(&path).await
    }

    async fn set_primary(
        &self,
        id: PhotoId,
        section: Section,
    ) -> ApiResult<SetPrimaryResponse> {
        let path = replace_param(v1::PHOTO_PRIMARY, "{id}", id.to_string());
        let path = replace_param(&path, "{section}", section.as_str());
        self.client.put(&path).await
    }

    async fn patch_preferences(
        &self,
        section: Section,
        preferences: SerializedPreferences,
    ) -> ApiResult<()> {
        let path =
            replace_param(v1::SECTION_PREFERENCES, "{section}", section.as_str());
        self.client
            .patch_no_content(&path, &PatchPreferencesRequest { preferences })
            .await
    }

    async fn get_photos(&self, section: Section) -> ApiResult<Vec<Photo>> {
        let path =
            replace_param(v1::SECTION_PHOTOS, "{section}", section.as_str());
        Ok(self
            .client
            .get_optional::<Vec<Photo>>(&path)
            .await?
            .unwrap_or_default())
    }

    async fn get_preferences(
        &self,
        section: Section,
    ) -> ApiResult<Option<PreferencesRecord>> {
        let path =
            replace_param(v1::SECTION_PREFERENCES, "{section}", section.as_str());
        self.client.get_optional(&path).await
    }
}
