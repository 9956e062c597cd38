//! Service wiring: per-message pipeline, operational counters, and the
//! read-only HTTP status surface.

pub mod api;
pub mod pipeline;
pub mod state;

pub use pipeline::MessagePipeline;
pub use state::{AppState, Counters, CountersSnapshot};
