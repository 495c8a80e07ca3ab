//! Photo and preference domains built on the generic engine.

pub mod hydration;
pub mod photos;
pub mod preferences;
pub mod profile;

pub use photos::ElectionOutcome;
pub use profile::{ProfileEngine, ProfileEngineBuilder};
