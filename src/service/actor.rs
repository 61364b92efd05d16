//! Actor directory
//!
//! Creates local actors with their key pairs, looks actors up by handle, id
//! or URI, and lazily materialises shadow records for remote actors.

use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::{Actor, Database, EntityId};
use crate::error::AppError;
use crate::federation::{
    ACTIVITY_STREAMS_CONTEXT, RemoteResolver, SECURITY_CONTEXT, first_id, generate_key_pair,
};

const MAX_HANDLE_LEN: usize = 64;

/// Lower-case and validate a local handle (`[a-z0-9_]`, 1-64 chars)
fn normalize_handle(handle: &str) -> Result<String, AppError> {
    let handle = handle.trim().to_ascii_lowercase();
    if handle.is_empty() {
        return Err(AppError::Validation("handle cannot be empty".to_string()));
    }
    if handle.len() > MAX_HANDLE_LEN {
        return Err(AppError::Validation(format!(
            "handle must be at most {} characters",
            MAX_HANDLE_LEN
        )));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(AppError::Validation(
            "handle may only contain a-z, 0-9 and _".to_string(),
        ));
    }
    Ok(handle)
}

fn optional_str(document: &Value, field: &str) -> Option<String> {
    document
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `publicKey.owner` when the document declares one
fn public_key_owner(document: &Value) -> Option<String> {
    let key = match document.get("publicKey")? {
        Value::Array(keys) => keys.first()?,
        other => other,
    };
    key.get("owner").and_then(first_id)
}

/// Build a shadow actor record from a remote actor document.
///
/// # Errors
/// `Validation` unless the document has `id`, `inbox` and
/// `publicKey.publicKeyPem`
pub(crate) fn remote_actor_from_document(document: &Value) -> Result<Actor, AppError> {
    let uri = optional_str(document, "id")
        .ok_or_else(|| AppError::Validation("actor document has no id".to_string()))?;
    let inbox_uri = document
        .get("inbox")
        .and_then(first_id)
        .ok_or_else(|| AppError::Validation("actor document has no inbox".to_string()))?;
    let public_key_pem = document
        .get("publicKey")
        .and_then(|key| match key {
            Value::Array(keys) => keys.first(),
            other => Some(other),
        })
        .and_then(|key| key.get("publicKeyPem"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("actor document has no public key".to_string()))?
        .to_string();

    let parsed = url::Url::parse(&uri)
        .map_err(|e| AppError::Validation(format!("Invalid actor id: {}", e)))?;
    let authority = crate::federation::host_header_value(&parsed)?;
    let username = optional_str(document, "preferredUsername").unwrap_or_else(|| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|segment| !segment.is_empty())
            .unwrap_or_else(|| "actor".to_string())
    });

    let now = Utc::now();
    Ok(Actor {
        id: EntityId::new().0,
        owner_id: None,
        handle: format!("{}@{}", username, authority),
        display_name: optional_str(document, "name"),
        summary: optional_str(document, "summary"),
        inbox_uri,
        shared_inbox_uri: document
            .get("endpoints")
            .and_then(|endpoints| endpoints.get("sharedInbox"))
            .and_then(first_id),
        outbox_uri: document.get("outbox").and_then(first_id),
        followers_uri: document.get("followers").and_then(first_id),
        following_uri: document.get("following").and_then(first_id),
        liked_uri: document.get("liked").and_then(first_id),
        public_key_pem,
        is_local: false,
        profile_json: Some(document.to_string()),
        profile_refreshed_at: Some(now),
        uri,
        created_at: now,
        updated_at: now,
    })
}

/// Actor directory service
pub struct ActorDirectory {
    db: Arc<Database>,
    resolver: Arc<dyn RemoteResolver>,
    base_url: String,
    key_bits: usize,
    profile_ttl: chrono::Duration,
}

impl ActorDirectory {
    pub fn new(db: Arc<Database>, resolver: Arc<dyn RemoteResolver>, config: &AppConfig) -> Self {
        Self {
            db,
            resolver,
            base_url: config.server.base_url(),
            key_bits: config.federation.key_bits,
            profile_ttl: chrono::Duration::seconds(
                i64::try_from(config.federation.profile_ttl_secs).unwrap_or(i64::MAX / 1000),
            ),
        }
    }

    /// Canonical URI of a local actor
    pub fn local_actor_uri(&self, handle: &str) -> String {
        format!("{}/users/{}", self.base_url, handle)
    }

    /// Whether a URI belongs to this instance
    pub fn is_local_uri(&self, uri: &str) -> bool {
        uri.strip_prefix(&self.base_url)
            .map(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(false)
    }

    /// Create a locally owned actor with a fresh key pair.
    ///
    /// # Errors
    /// - `Validation` for a malformed handle
    /// - `Conflict` when the handle is taken
    pub async fn create_local_actor(
        &self,
        owner_id: &str,
        handle: &str,
        display_name: Option<String>,
        summary: Option<String>,
    ) -> Result<Actor, AppError> {
        let handle = normalize_handle(handle)?;

        // Fast-path guard before expensive key generation.
        if self.db.get_actor_by_handle(&handle).await?.is_some() {
            return Err(AppError::Conflict(format!("handle {} is taken", handle)));
        }

        let key_bits = self.key_bits;
        let key_pair = tokio::task::spawn_blocking(move || generate_key_pair(key_bits))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        let uri = self.local_actor_uri(&handle);
        let now = Utc::now();
        let actor = Actor {
            id: EntityId::new().0,
            owner_id: Some(owner_id.to_string()),
            handle: handle.clone(),
            display_name,
            summary,
            inbox_uri: format!("{}/inbox", uri),
            shared_inbox_uri: Some(format!("{}/inbox", self.base_url)),
            outbox_uri: Some(format!("{}/outbox", uri)),
            followers_uri: Some(format!("{}/followers", uri)),
            following_uri: Some(format!("{}/following", uri)),
            liked_uri: Some(format!("{}/liked", uri)),
            public_key_pem: key_pair.public_key_pem,
            is_local: true,
            profile_json: None,
            profile_refreshed_at: None,
            uri,
            created_at: now,
            updated_at: now,
        };

        // A concurrent create with the same handle surfaces as Conflict here.
        self.db
            .insert_actor(&actor, Some(&key_pair.private_key_pem))
            .await?;

        tracing::info!(actor_id = %actor.id, handle = %handle, "Created local actor");
        Ok(actor)
    }

    pub async fn find_by_handle(&self, handle: &str) -> Result<Actor, AppError> {
        self.db
            .get_actor_by_handle(handle.trim())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Actor, AppError> {
        self.db.get_actor_by_id(id).await?.ok_or(AppError::NotFound)
    }

    /// Look an actor up by URI, dereferencing unknown remote actors.
    ///
    /// # Errors
    /// `NotFound` for unknown local URIs and remote URIs that cannot be
    /// dereferenced into an actor document
    pub async fn find_by_uri(&self, uri: &str) -> Result<Actor, AppError> {
        let uri = uri.trim();
        if let Some(actor) = self.db.get_actor_by_uri(uri).await? {
            return Ok(actor);
        }
        if self.is_local_uri(uri) {
            return Err(AppError::NotFound);
        }

        self.fetch_remote_actor(uri).await
    }

    /// Re-dereference a remote actor, replacing the shadow record.
    pub async fn refresh_remote_actor(&self, uri: &str) -> Result<Actor, AppError> {
        if self.is_local_uri(uri) {
            return self.db.get_actor_by_uri(uri).await?.ok_or(AppError::NotFound);
        }
        self.fetch_remote_actor(uri).await
    }

    async fn fetch_remote_actor(&self, uri: &str) -> Result<Actor, AppError> {
        let Some(document) = self.resolver.fetch_remote_object(uri).await else {
            tracing::debug!(uri = %uri, "Remote actor not fetchable");
            return Err(AppError::NotFound);
        };

        self.store_remote_actor(uri, &document).await.map_err(|error| {
            tracing::warn!(uri = %uri, error = %error, "Remote document is not a usable actor");
            match error {
                AppError::Validation(_) | AppError::Forbidden => AppError::NotFound,
                other => other,
            }
        })
    }

    /// Insert or refresh a shadow actor from its document.
    ///
    /// `expected_uri` is the URI the document was fetched from or announced
    /// for. A document describing any other actor, or advertising a key owned
    /// by another actor, never touches the directory.
    ///
    /// # Errors
    /// - `Validation` for incomplete documents
    /// - `Forbidden` for an id mismatch, a foreign key owner or a local URI
    pub async fn store_remote_actor(
        &self,
        expected_uri: &str,
        document: &Value,
    ) -> Result<Actor, AppError> {
        let mut actor = remote_actor_from_document(document)?;
        if actor.uri != expected_uri.trim() {
            tracing::warn!(
                expected = %expected_uri,
                claimed = %actor.uri,
                "Actor document id does not match its URI"
            );
            return Err(AppError::Forbidden);
        }
        if let Some(owner) = public_key_owner(document) {
            if owner != actor.uri {
                tracing::warn!(actor = %actor.uri, owner = %owner, "Actor key belongs to another actor");
                return Err(AppError::Forbidden);
            }
        }
        if self.is_local_uri(&actor.uri) {
            return Err(AppError::Forbidden);
        }

        match self.db.upsert_remote_actor(&actor).await {
            Err(AppError::Conflict(_)) => {
                // Handle already used by a different URI; fall back to the URI.
                actor.handle = actor.uri.clone();
                self.db.upsert_remote_actor(&actor).await
            }
            other => other,
        }
    }

    /// Public profile document of an actor.
    ///
    /// Local documents are built on demand and cached on the record; remote
    /// ones are re-fetched once stale, keeping the stale copy when the peer
    /// is unreachable.
    pub async fn get_profile_document(&self, actor: &Actor) -> Result<Value, AppError> {
        let cached = actor
            .profile_json
            .as_deref()
            .and_then(|json| serde_json::from_str::<Value>(json).ok());
        let fresh = actor
            .profile_refreshed_at
            .map(|at| Utc::now() - at < self.profile_ttl)
            .unwrap_or(false);

        if let (Some(document), true) = (&cached, fresh) {
            return Ok(document.clone());
        }

        if actor.is_local {
            let document = self.build_local_profile(actor);
            self.db
                .update_actor_profile_cache(&actor.id, &document.to_string(), Utc::now())
                .await?;
            return Ok(document);
        }

        match self.resolver.fetch_remote_object(&actor.uri).await {
            Some(document) => match self.store_remote_actor(&actor.uri, &document).await {
                Ok(_) => Ok(document),
                Err(error) => {
                    tracing::warn!(uri = %actor.uri, error = %error, "Ignoring refreshed actor document");
                    cached.ok_or(error)
                }
            },
            None => cached.ok_or(AppError::NotFound),
        }
    }

    fn build_local_profile(&self, actor: &Actor) -> Value {
        json!({
            "@context": [
                ACTIVITY_STREAMS_CONTEXT,
                SECURITY_CONTEXT
            ],
            "type": "Person",
            "id": actor.uri,
            "preferredUsername": actor.handle,
            "name": actor.display_name.clone().unwrap_or_else(|| actor.handle.clone()),
            "summary": actor.summary.clone().unwrap_or_default(),
            "inbox": actor.inbox_uri,
            "outbox": actor.outbox_uri,
            "followers": actor.followers_uri,
            "following": actor.following_uri,
            "liked": actor.liked_uri,
            "url": actor.uri,
            "endpoints": {
                "sharedInbox": actor.shared_inbox_uri
            },
            "publicKey": {
                "id": actor.key_id(),
                "owner": actor.uri,
                "publicKeyPem": actor.public_key_pem
            }
        })
    }

    /// Current follower URIs of an actor.
    ///
    /// Local actors read accepted follows; remote actors dereference their
    /// followers collection.
    pub async fn followers_of(&self, actor: &Actor) -> Result<Vec<String>, AppError> {
        if actor.is_local {
            return self.db.get_follower_uris(&actor.uri).await;
        }

        match actor.followers_uri.as_deref() {
            Some(collection) => self.resolver.get_followers_collection(collection).await,
            None => Ok(Vec::new()),
        }
    }
}
