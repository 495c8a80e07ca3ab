//! Test doubles for the profile service and the engine's side channels.

pub mod api;
pub mod recorder;

pub use api::{ApiCall, ApiOp, TestProfileApi};
pub use recorder::{ChangeLog, RecordingReporter};
