//! Public Key Caching
//!
//! Caches signer public keys resolved through the actor directory so that
//! every inbound request does not hit the database or the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::service::ActorDirectory;

/// Cached public key entry
#[derive(Debug, Clone)]
struct CachedKey {
    owner_uri: String,
    pem: String,
    cached_at: Instant,
}

/// A signer key ready for verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerKey {
    /// Actor URI owning the key
    pub owner_uri: String,
    pub public_key_pem: String,
}

/// Actor URI a key id belongs to (`https://a.example/users/x#main-key`)
pub fn key_owner_uri(key_id: &str) -> &str {
    key_id.split('#').next().unwrap_or(key_id)
}

/// Public key cache
///
/// Thread-safe cache of signer keys, keyed by key id.
pub struct PublicKeyCache {
    cache: Arc<RwLock<HashMap<String, CachedKey>>>,
    directory: Arc<ActorDirectory>,
    ttl: Duration,
}

impl PublicKeyCache {
    pub fn new(directory: Arc<ActorDirectory>, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            directory,
            ttl,
        }
    }

    /// Get the key for a key id
    ///
    /// # Errors
    /// `Unauthorized` when the owning actor cannot be resolved
    pub async fn get(&self, key_id: &str) -> Result<SignerKey, AppError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(key_id) {
                if cached.cached_at.elapsed() < self.ttl {
                    tracing::debug!(key_id = %key_id, "Public key cache hit");
                    return Ok(SignerKey {
                        owner_uri: cached.owner_uri.clone(),
                        public_key_pem: cached.pem.clone(),
                    });
                }
            }
        }

        let owner_uri = key_owner_uri(key_id);
        let actor = match self.directory.find_by_uri(owner_uri).await {
            Ok(actor) => actor,
            Err(AppError::NotFound) => {
                tracing::warn!(key_id = %key_id, "Signer could not be resolved");
                return Err(AppError::Unauthorized);
            }
            Err(other) => return Err(other),
        };
        self.store(key_id, &actor.uri, &actor.public_key_pem).await;

        Ok(SignerKey {
            owner_uri: actor.uri,
            public_key_pem: actor.public_key_pem,
        })
    }

    /// Verify with the cached key, refreshing it once on failure.
    ///
    /// Covers peers that rotated their key since it was cached.
    ///
    /// # Returns
    /// The key that verified
    pub async fn verify_with_refresh<F>(&self, key_id: &str, verify: F) -> Result<SignerKey, AppError>
    where
        F: Fn(&str) -> Result<(), AppError>,
    {
        let key = self.get(key_id).await?;
        match verify(&key.public_key_pem) {
            Err(AppError::VerificationFailed) => {}
            Ok(()) => return Ok(key),
            Err(other) => return Err(other),
        }

        tracing::debug!(key_id = %key_id, "Verification failed, refreshing signer key");
        self.invalidate(key_id).await;
        let actor = match self.directory.refresh_remote_actor(&key.owner_uri).await {
            Ok(actor) => actor,
            Err(AppError::NotFound) => return Err(AppError::VerificationFailed),
            Err(other) => return Err(other),
        };
        if actor.public_key_pem == key.public_key_pem {
            return Err(AppError::VerificationFailed);
        }

        verify(&actor.public_key_pem)?;
        self.store(key_id, &actor.uri, &actor.public_key_pem).await;
        Ok(SignerKey {
            owner_uri: actor.uri,
            public_key_pem: actor.public_key_pem,
        })
    }

    async fn store(&self, key_id: &str, owner_uri: &str, pem: &str) {
        let mut cache = self.cache.write().await;
        cache.insert(
            key_id.to_string(),
            CachedKey {
                owner_uri: owner_uri.to_string(),
                pem: pem.to_string(),
                cached_at: Instant::now(),
            },
        );
    }

    /// Invalidate a cached key
    pub async fn invalidate(&self, key_id: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(key_id);
        tracing::debug!(key_id = %key_id, "Invalidated public key cache entry");
    }
}
