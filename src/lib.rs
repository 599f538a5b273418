//! Feed ingestion, content scoring and feedback-weighted recommendations.

pub mod analyze;
pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod recommend;
pub mod store;

pub use api::{router, AppState};
