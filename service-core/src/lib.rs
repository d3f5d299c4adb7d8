//! service-core: Shared infrastructure for payment services.
pub mod error;
pub mod middleware;
pub mod utils;

pub use axum;
pub use mongodb;
pub use serde;
pub use serde_json;
pub use tracing;
