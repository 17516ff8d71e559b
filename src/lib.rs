//! Library crate for endpoint-check exposing the checking pipeline modules.
pub mod cache;
pub mod endpoint;
pub mod fetch;
pub mod prober;
pub mod summary;
