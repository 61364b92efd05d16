//! API layer
//!
//! HTTP handlers for:
//! - ActivityPub (for federation)
//! - Health and metrics (Prometheus)

mod activitypub;
mod metrics;

pub use activitypub::activitypub_router;
pub use metrics::ops_router;
