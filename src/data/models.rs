//! Data models
//!
//! Rust structs representing database rows.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Actor
// =============================================================================

/// A federated identity, either owned by this instance or a shadow copy of a
/// remote one.
///
/// Private key material is intentionally absent: it is only reachable through
/// [`crate::federation::KeyStore`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Actor {
    pub id: String,
    /// Local user that owns this actor (None for remote shadows)
    pub owner_id: Option<String>,
    /// Canonical ActivityPub id (globally unique)
    pub uri: String,
    /// `name` for local actors, `name@host` for remote shadows
    pub handle: String,
    pub display_name: Option<String>,
    pub summary: Option<String>,
    pub inbox_uri: String,
    pub shared_inbox_uri: Option<String>,
    pub outbox_uri: Option<String>,
    pub followers_uri: Option<String>,
    pub following_uri: Option<String>,
    pub liked_uri: Option<String>,
    /// RSA public key (PEM format)
    pub public_key_pem: String,
    pub is_local: bool,
    /// Cached profile document (JSON)
    pub profile_json: Option<String>,
    pub profile_refreshed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Actor {
    /// Key id advertised in the profile and used in outbound signatures
    pub fn key_id(&self) -> String {
        format!("{}#main-key", self.uri)
    }

    /// Inbox to deliver to, optionally preferring the shared inbox
    pub fn delivery_inbox(&self, prefer_shared: bool) -> &str {
        match (prefer_shared, self.shared_inbox_uri.as_deref()) {
            (true, Some(shared)) if !shared.is_empty() => shared,
            _ => &self.inbox_uri,
        }
    }
}

// =============================================================================
// Activity log
// =============================================================================

/// Whether an activity arrived from a peer or was originated here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityDirection {
    Inbound,
    Outbound,
}

impl ActivityDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// An entry of the append-only activity log
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityRecord {
    pub id: String,
    /// Canonical activity URI (globally unique)
    pub uri: String,
    pub activity_type: String,
    pub actor_uri: String,
    pub object_uri: Option<String>,
    /// Full JSON payload as received or sent
    pub payload: String,
    /// "inbound" or "outbound"
    pub direction: String,
    pub recipient_actor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// Parse the stored payload
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

// =============================================================================
// Relations
// =============================================================================

/// Kinds of (subject, object) relation kept by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Follow,
    Like,
    Announce,
    Block,
}

impl RelationKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Follow => "follows",
            Self::Like => "likes",
            Self::Announce => "announces",
            Self::Block => "blocks",
        }
    }
}

/// A relation row. Unique per (actor_uri, object_uri) within its kind.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Relation {
    pub id: String,
    /// Subject actor URI
    pub actor_uri: String,
    /// Object URI (actor for Follow/Block, object for Like/Announce)
    pub object_uri: String,
    /// Activity that created the relation
    pub activity_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    pub fn new(actor_uri: &str, object_uri: &str, activity_uri: Option<&str>) -> Self {
        Self {
            id: EntityId::new().0,
            actor_uri: actor_uri.to_string(),
            object_uri: object_uri.to_string(),
            activity_uri: activity_uri.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

/// State of a Follow relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    /// Sent or received, not yet accepted
    Pending,
    Accepted,
}

impl FollowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }
}

// =============================================================================
// Shadow objects
// =============================================================================

/// Cached copy of a remote object (Note, Article, ...)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShadowObject {
    pub id: String,
    pub uri: String,
    pub object_type: String,
    /// Author URI, when the object names one
    pub attributed_to: Option<String>,
    pub payload: String,
    /// Tombstoned by a Delete
    pub deleted: bool,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShadowObject {
    /// Build a shadow record from an object document.
    ///
    /// Returns None when the document has no string `id`.
    pub fn from_document(document: &serde_json::Value) -> Option<Self> {
        let uri = document.get("id")?.as_str()?.trim();
        if uri.is_empty() {
            return None;
        }
        let now = Utc::now();
        Some(Self {
            id: EntityId::new().0,
            uri: uri.to_string(),
            object_type: document
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Object")
                .to_string(),
            attributed_to: document
                .get("attributedTo")
                .and_then(crate::federation::first_id),
            payload: document.to_string(),
            deleted: false,
            fetched_at: now,
            updated_at: now,
        })
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Lifecycle of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    /// Attempt budget exhausted or non-retryable failure
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Dead => "dead",
        }
    }
}

/// A row of the durable job queue
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: String,
    /// "inbox" or "outbox"
    pub kind: String,
    pub payload: String,
    pub status: String,
    /// Attempts already made (including a running one)
    pub attempts: i64,
    pub max_attempts: i64,
    pub next_run_at_ms: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
