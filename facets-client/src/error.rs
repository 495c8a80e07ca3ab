use facets_model::{ModelError, PhotoId, Section};

/// Result type for profile service calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures reported by the profile service transport
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Empty response from server")]
    EmptyResponse,

    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl ApiError {
    /// Server rejected the write because its view of the state moved on.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }
}

/// Rejections raised before a mutation is allowed to begin
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported media type: {0}")]
    UnsupportedType(String),

    #[error("Upload is empty")]
    Empty,

    #[error("Upload is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Section {section} already holds {capacity} photos")]
    SectionFull { section: Section, capacity: usize },
}

/// Broad failure buckets used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Network,
    Conflict,
    Local,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Photo {0} is not known to the store")]
    UnknownPhoto(PhotoId),

    #[error("Engine is unmounted")]
    Unmounted,

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::Validation(_) => FailureKind::Validation,
            EngineError::Api(err) if err.is_conflict() => FailureKind::Conflict,
            EngineError::Api(_) => FailureKind::Network,
            EngineError::UnknownPhoto(_)
            | EngineError::Unmounted
            | EngineError::Model(_) => FailureKind::Local,
        }
    }
}
