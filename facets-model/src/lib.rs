//! Core data model definitions shared across Facets crates.
#![allow(missing_docs)]

pub mod api;
pub mod error;
pub mod ids;
pub mod photo;
pub mod preferences;
pub mod section;

// Intentionally curated re-exports for downstream consumers.
pub use api::{
    ApiEnvelope, PatchPreferencesRequest, PreferencesRecord,
    SetPrimaryResponse, UploadPhotoRequest, UploadedPhoto,
};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{CONFIRMED_ID_CEILING, PhotoId, RecordId, UserId};
pub use photo::{Photo, PhotoContent, PhotoUpload};
pub use preferences::{PreferenceMap, SerializedPreferences};
pub use section::{Section, SectionFlags};
