//! Facets client library
//!
//! Client-resident consistency layer for sectioned profile media and
//! per-section field visibility preferences. Writes land in a shared local
//! store immediately and are confirmed, reconciled or rolled back as the
//! profile service answers.
//!
//! Notes
//! - `engine` holds the generic machinery: temporary identities, the keyed
//!   optimistic store, the mutation coordinator and the pure selectors.
//! - `domains` instantiates that machinery for photos and preferences and
//!   exposes the [`ProfileEngine`] façade the UI talks to.
//! - `infra` carries configuration, the HTTP adapter, time and reporting.

pub mod domains;
pub mod engine;
pub mod error;
pub mod infra;

pub use domains::photos::ElectionOutcome;
pub use domains::{ProfileEngine, ProfileEngineBuilder};
pub use engine::selectors::PhotoPage;
pub use error::{ApiError, ApiResult, EngineError, EngineResult, ValidationError};
pub use infra::config::EngineConfig;
