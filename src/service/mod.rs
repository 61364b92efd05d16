//! Service layer
//!
//! Actor directory and activity origination, shared by the HTTP handlers
//! and the federation pipelines.

mod actor;
mod publish;

pub use actor::ActorDirectory;
pub use publish::{PublishService, Published};
