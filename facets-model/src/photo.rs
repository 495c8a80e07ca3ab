use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};

use crate::ids::{PhotoId, UserId};
use crate::section::{Section, SectionFlags};

/// Where a photo's bytes currently live
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum PhotoContent {
    /// Base64 payload held locally until the server confirms the upload
    Inline { media_type: String, data: String },
    /// Server-stored copy
    Stored { url: String },
}

impl PhotoContent {
    /// Value a renderer can hand straight to an image source.
    pub fn source(&self) -> String {
        match self {
            PhotoContent::Inline { media_type, data } => {
                format!("data:{media_type};base64,{data}")
            }
            PhotoContent::Stored { url } => url.clone(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, PhotoContent::Inline { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Photo {
    pub id: PhotoId,
    pub owner_id: UserId,
    pub content: PhotoContent,
    #[cfg_attr(feature = "serde", serde(default))]
    pub primary: SectionFlags,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn is_primary_for(&self, section: Section) -> bool {
        self.primary.get(section)
    }

    pub fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }
}

/// Raw upload request as handed over by the file picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn inline_content(&self) -> PhotoContent {
        PhotoContent::Inline {
            media_type: self.media_type.clone(),
            data: self.encoded(),
        }
    }
}
