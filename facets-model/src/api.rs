//! Request and response shapes exchanged with the profile service.

use chrono::{DateTime, Utc};

use crate::ids::{PhotoId, RecordId, UserId};
use crate::photo::Photo;
use crate::preferences::SerializedPreferences;
use crate::section::Section;

/// Envelope every JSON endpoint wraps its payload in
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApiEnvelope<T> {
    pub data: Option<T>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UploadPhotoRequest {
    pub owner_id: UserId,
    pub section: Section,
    pub media_type: String,
    /// Base64 encoded image bytes
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UploadedPhoto {
    pub id: PhotoId,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Authoritative section list returned after a primary change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetPrimaryResponse {
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchPreferencesRequest {
    pub preferences: SerializedPreferences,
}

/// A section's profile record as far as preferences are concerned
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreferencesRecord {
    pub record_id: RecordId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub preferences: SerializedPreferences,
}

pub mod routes {
    pub mod v1 {
        pub const SECTION_PHOTOS: &str = "/api/v1/profiles/{section}/photos";
        pub const PHOTO_ITEM: &str = "/api/v1/photos/{id}";
        pub const PHOTO_PRIMARY: &str =
            "/api/v1/photos/{id}/primary/{section}";
        pub const SECTION_PREFERENCES: &str =
            "/api/v1/profiles/{section}/preferences";
    }

    /// Substitute a `{param}` placeholder in a route template.
    pub fn replace_param(
        route: &str,
        param: &str,
        value: impl AsRef<str>,
    ) -> String {
        route.replace(param, value.as_ref())
    }
}
