//! Side-effect reporting for failed user-initiated writes.
//!
//! The notification surface (toasts, banners) lives outside the engine. It
//! plugs in through [`FailureReporter`]; the default reporter only logs.

use crate::error::EngineError;

pub trait FailureReporter: Send + Sync {
    /// Called once per rolled-back user action.
    fn report(&self, action: &str, error: &EngineError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, action: &str, error: &EngineError) {
        log::error!("[Facets] {action} failed ({:?}): {error}", error.kind());
    }
}
