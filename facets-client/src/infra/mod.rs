pub mod api_client;
pub mod config;
pub mod reporting;
pub mod services;
pub mod time;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api_client::ApiClient;
pub use config::EngineConfig;
