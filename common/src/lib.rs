//! Building blocks shared by the weather services: the client-facing error
//! taxonomy, a single-attempt upstream HTTP client, data models and tracing setup.

pub mod errors;
pub mod http_client;
pub mod models;
pub mod tracing;
