//! Private key access
//!
//! Signing code never reads private keys from actor records directly; it asks
//! a [`KeyStore`] for the key of a local actor. The default store reads the
//! key column of the actors table.

use async_trait::async_trait;
use std::sync::Arc;

use crate::data::Database;
use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// PKCS#8 PEM private key of a local actor.
    ///
    /// # Errors
    /// `NotFound` when the actor is unknown or not local
    async fn private_key_pem(&self, actor_id: &str) -> Result<String, AppError>;
}

/// Key store backed by the actors table
pub struct DatabaseKeyStore {
    db: Arc<Database>,
}

impl DatabaseKeyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyStore for DatabaseKeyStore {
    async fn private_key_pem(&self, actor_id: &str) -> Result<String, AppError> {
        self.db
            .get_actor_private_key(actor_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
