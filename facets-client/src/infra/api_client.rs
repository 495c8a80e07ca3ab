use facets_model::ApiEnvelope;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// JSON client for the profile service
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into());
        let client = Client::builder().timeout(timeout).build()?;

        info!("[ApiClient] Creating API client for {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: impl AsRef<str>) -> String {
        let p = path.as_ref();
        if p.starts_with("http://") || p.starts_with("https://") {
            return p.to_string();
        }
        format!("{}/{}", self.base_url, p.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.get_optional(path).await?.ok_or(ApiError::EmptyResponse)
    }

    /// GET where an absent resource is a normal answer
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> ApiResult<Option<T>> {
        let url = self.build_url(path);
        debug!("[ApiClient] GET {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ApiEnvelope<T> = Self::decode(response).await?;
        Ok(envelope.data)
    }

    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> ApiResult<R> {
        let url = self.build_url(path);
        self.execute_request(self.client.post(&url).json(body)).await
    }

    pub async fn put<R: DeserializeOwned>(&self, path: &str) -> ApiResult<R> {
        let url = self.build_url(path);
        self.execute_request(self.client.put(&url)).await
    }

    /// PATCH request for endpoints that answer 204 No Content
    pub async fn patch_no_content<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> ApiResult<()> {
        let url = self.build_url(path);
        self.execute_no_content(self.client.patch(&url).json(body))
            .await
    }

    pub async fn delete_no_content(&self, path: &str) -> ApiResult<()> {
        let url = self.build_url(path);
        self.execute_no_content(self.client.delete(&url)).await
    }

    async fn execute_request<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ApiResult<R> {
        let response = request.send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Err(ApiError::EmptyResponse);
        }
        let envelope: ApiEnvelope<R> = Self::decode(response).await?;
        envelope.data.ok_or(ApiError::EmptyResponse)
    }

    async fn execute_no_content(&self, request: RequestBuilder) -> ApiResult<()> {
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            _ => Err(Self::failure(response).await),
        }
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
    ) -> ApiResult<ApiEnvelope<T>> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        if let Some(error) = &envelope.error {
            warn!("[ApiClient] Server reported error with success status: {}", error);
        }
        Ok(envelope)
    }

    async fn failure(response: Response) -> ApiError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                ApiError::Conflict(message)
            }
            status => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }
}

// Many users will provide "localhost:3000", which reqwest rejects.
fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim().trim_end_matches('/').to_string();
    let with_scheme =
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed
        } else {
            format!("http://{}", trimmed)
        };
    if url::Url::parse(&with_scheme).is_err() {
        warn!("[ApiClient] Base URL '{}' does not parse as a URL", with_scheme);
    } else if with_scheme != raw {
        warn!(
            "[ApiClient] Normalized base URL from '{}' to '{}'",
            raw, with_scheme
        );
    }
    with_scheme
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_a_scheme_and_loses_trailing_slash() {
        assert_eq!(
            normalize_base_url("localhost:3000/".into()),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_base_url("https://profiles.example".into()),
            "https://profiles.example"
        );
    }

    #[test]
    fn relative_paths_join_the_base_url() {
        let client =
            ApiClient::new("localhost:3000", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.build_url("/api/v1/photos/4"),
            "http://localhost:3000/api/v1/photos/4"
        );
        assert_eq!(
            client.build_url("https://cdn.example/x"),
            "https://cdn.example/x"
        );
    }
}
