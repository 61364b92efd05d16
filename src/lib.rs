//! fedcore - activity delivery and reception engine for an ActivityPub node
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Signed inbox endpoints, actor documents, collections     │
//! │  - Health and metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ enqueue (202)
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Jobs (durable queue)                       │
//! │  - Inbox / outbox jobs, retry with backoff, dead letters    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Federation + Service Layer                      │
//! │  - Inbox pipeline (ledger, dispatch)                        │
//! │  - Outbox pipeline (recipients, signing, fan-out)           │
//! │  - Actor directory, remote resolver, publishing             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `jobs`: Queue substrate and worker
//! - `federation`: Signatures, resolver, inbox and outbox pipelines
//! - `service`: Actor directory and publishing
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod jobs;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Maximum accepted inbound request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all handlers
///
/// Cloned for each request; every member is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub db: Arc<data::Database>,
    pub directory: Arc<service::ActorDirectory>,
    pub publisher: Arc<service::PublishService>,
    pub queue: jobs::JobQueue,
    pub key_cache: Arc<federation::PublicKeyCache>,
    pub worker: Arc<jobs::JobWorker>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the federation HTTP client and resolver
    /// 3. Wire services, pipelines and the job worker
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let http_client = federation::build_http_client(&config.federation)?;
        let resolver: Arc<dyn federation::RemoteResolver> = Arc::new(federation::HttpResolver::new(
            http_client.clone(),
            db.clone(),
            config.federation.allow_private_networks,
        ));

        Ok(Self::with_resolver(config, db, resolver, http_client))
    }

    /// Wire the state around an existing database and resolver.
    pub fn with_resolver(
        config: config::AppConfig,
        db: Arc<data::Database>,
        resolver: Arc<dyn federation::RemoteResolver>,
        http_client: reqwest::Client,
    ) -> Self {
        let directory = Arc::new(service::ActorDirectory::new(
            db.clone(),
            resolver.clone(),
            &config,
        ));
        let queue = jobs::JobQueue::new(db.clone(), config.queue.clone());
        let publisher = Arc::new(service::PublishService::new(
            db.clone(),
            directory.clone(),
            queue.clone(),
        ));
        let key_cache = Arc::new(federation::PublicKeyCache::new(
            directory.clone(),
            std::time::Duration::from_secs(config.federation.key_cache_ttl_secs),
        ));

        let inbox = Arc::new(federation::InboxProcessor::new(
            db.clone(),
            directory.clone(),
            resolver,
            publisher.clone(),
        ));
        let outbox = Arc::new(federation::OutboxProcessor::new(
            db.clone(),
            directory.clone(),
            Arc::new(federation::DatabaseKeyStore::new(db.clone())),
            http_client,
            &config.federation,
        ));
        let worker = Arc::new(jobs::JobWorker::new(
            queue.clone(),
            inbox,
            outbox,
            directory.clone(),
        ));

        Self {
            config: Arc::new(config),
            db,
            directory,
            publisher,
            queue,
            key_cache,
            worker,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

    Router::new()
        .merge(api::activitypub_router())
        .merge(api::ops_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
