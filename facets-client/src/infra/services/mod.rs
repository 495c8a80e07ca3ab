//! Service abstractions over the profile backend

pub mod http;
pub mod profile_api;

pub use http::HttpProfileApi;
pub use profile_api::ProfileApi;
