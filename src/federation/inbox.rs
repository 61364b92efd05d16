//! Inbox pipeline
//!
//! Applies authenticated inbound activities. Every activity passes the
//! processed-activity ledger before anything else happens, so a redelivered
//! activity is acknowledged without repeating its side effects.
//!
//! The ledger row is written before the side effects and never rolled back:
//! if a handler fails after the row exists, a retry of the same activity is
//! skipped. Side effects are therefore applied at most once.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::activity::{
    ActivityKind, actor_uri, canonical_activity_uri, embedded_object, object_uri,
};
use super::builder;
use super::ledger::ProcessedActivityLedger;
use super::resolver::RemoteResolver;
use crate::data::{
    Actor, ActivityDirection, ActivityRecord, Database, EntityId, FollowState, Relation,
    RelationKind, ShadowObject,
};
use crate::error::AppError;
use crate::service::{ActorDirectory, PublishService};

/// Result of processing one inbound activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxOutcome {
    /// Side effects applied
    Applied {
        activity_uri: String,
        activity_type: String,
    },
    /// Already processed; nothing done
    Skipped { activity_uri: String },
}

/// Relation kept for an activity kind, if any
pub(crate) fn relation_kind(kind: &ActivityKind) -> Option<RelationKind> {
    match kind {
        ActivityKind::Follow => Some(RelationKind::Follow),
        ActivityKind::Like => Some(RelationKind::Like),
        ActivityKind::Announce => Some(RelationKind::Announce),
        ActivityKind::Block => Some(RelationKind::Block),
        _ => None,
    }
}

/// Reverse the relation created by `original` on behalf of `actor`.
///
/// `original` is the embedded object of an Undo. When it does not carry its
/// own `object`, it is looked up in the activity log by id, then among the
/// relations by creating activity.
///
/// # Returns
/// true when a relation was removed
///
/// # Errors
/// `Forbidden` when the original activity belongs to a different actor
pub(crate) async fn reverse_relation(
    db: &Database,
    actor: &str,
    original: &Value,
) -> Result<bool, AppError> {
    let resolved = match original.get("object") {
        Some(_) if original.is_object() => Some(original.clone()),
        _ => match super::activity::first_id(original) {
            Some(id) => db
                .get_activity_by_uri(&id)
                .await?
                .and_then(|record| record.payload_json()),
            None => None,
        },
    };

    let Some(resolved) = resolved else {
        // Unknown original: find the relation it created, if any
        let Some(id) = super::activity::first_id(original) else {
            return Ok(false);
        };
        for kind in [
            RelationKind::Follow,
            RelationKind::Like,
            RelationKind::Announce,
            RelationKind::Block,
        ] {
            if let Some(relation) = db.get_relation_by_activity_uri(kind, &id).await? {
                if relation.actor_uri != actor {
                    return Err(AppError::Forbidden);
                }
                return db
                    .delete_relation(kind, &relation.actor_uri, &relation.object_uri)
                    .await;
            }
        }
        tracing::debug!(original = %id, "Undo target not found");
        return Ok(false);
    };

    if actor_uri(&resolved).as_deref() != Some(actor) {
        return Err(AppError::Forbidden);
    }

    let Some(kind) = ActivityKind::of(&resolved).as_ref().and_then(relation_kind) else {
        tracing::debug!(
            activity_type = ?super::activity::activity_type(&resolved),
            "Undo of an activity without a relation"
        );
        return Ok(false);
    };
    let Some(object) = object_uri(&resolved) else {
        return Ok(false);
    };

    db.delete_relation(kind, actor, &object).await
}

/// Inbound activity processor
pub struct InboxProcessor {
    db: Arc<Database>,
    directory: Arc<ActorDirectory>,
    resolver: Arc<dyn RemoteResolver>,
    ledger: ProcessedActivityLedger,
    publisher: Arc<PublishService>,
}

impl InboxProcessor {
    pub fn new(
        db: Arc<Database>,
        directory: Arc<ActorDirectory>,
        resolver: Arc<dyn RemoteResolver>,
        publisher: Arc<PublishService>,
    ) -> Self {
        Self {
            ledger: ProcessedActivityLedger::new(db.clone()),
            db,
            directory,
            resolver,
            publisher,
        }
    }

    /// Process an authenticated inbound activity.
    ///
    /// # Arguments
    /// * `activity` - Activity document as received
    /// * `recipient` - Local actor whose inbox received it (None for the shared inbox)
    ///
    /// # Errors
    /// - `Validation` for documents without a `type` or `actor`
    /// - `Forbidden` when the sender may not act on the referenced object
    /// - storage and resolver errors from the handlers
    pub async fn process(
        &self,
        activity: &Value,
        recipient: Option<&Actor>,
    ) -> Result<InboxOutcome, AppError> {
        let (kind, sender) = validate(activity)?;
        let activity_uri = canonical_activity_uri(activity);

        if !self.ledger.insert_if_absent(&activity_uri).await? {
            tracing::debug!(activity_uri = %activity_uri, "Activity already processed");
            crate::metrics::ACTIVITIES_RECEIVED
                .with_label_values(&[kind.metric_label(), "skipped"])
                .inc();
            return Ok(InboxOutcome::Skipped { activity_uri });
        }

        tracing::info!(
            activity_uri = %activity_uri,
            activity_type = %kind.as_str(),
            actor = %sender,
            "Processing inbound activity"
        );

        let result = self
            .apply(activity, &kind, &sender, &activity_uri, recipient)
            .await;

        let outcome = if result.is_ok() { "applied" } else { "rejected" };
        crate::metrics::ACTIVITIES_RECEIVED
            .with_label_values(&[kind.metric_label(), outcome])
            .inc();

        if let Err(error) = &result {
            tracing::warn!(
                activity_uri = %activity_uri,
                activity_type = %kind.as_str(),
                error = %error,
                "Inbound activity failed after ledger entry"
            );
        }
        result?;

        Ok(InboxOutcome::Applied {
            activity_uri,
            activity_type: kind.as_str().to_string(),
        })
    }

    async fn apply(
        &self,
        activity: &Value,
        kind: &ActivityKind,
        sender: &str,
        activity_uri: &str,
        recipient: Option<&Actor>,
    ) -> Result<(), AppError> {
        let record = ActivityRecord {
            id: EntityId::new().0,
            uri: activity_uri.to_string(),
            activity_type: kind.as_str().to_string(),
            actor_uri: sender.to_string(),
            object_uri: object_uri(activity),
            payload: activity.to_string(),
            direction: ActivityDirection::Inbound.as_str().to_string(),
            recipient_actor_id: recipient.map(|actor| actor.id.clone()),
            created_at: Utc::now(),
        };
        if !self.db.insert_activity(&record).await? {
            tracing::debug!(activity_uri = %activity_uri, "Activity already in the log");
        }

        match kind {
            ActivityKind::Follow => self.handle_follow(activity, sender, activity_uri).await,
            ActivityKind::Accept => self.handle_accept(activity, sender).await,
            ActivityKind::Reject => self.handle_reject(activity, sender).await,
            ActivityKind::Like => {
                self.handle_relation(RelationKind::Like, activity, sender, activity_uri)
                    .await
            }
            ActivityKind::Announce => self.handle_announce(activity, sender, activity_uri).await,
            ActivityKind::Block => self.handle_block(activity, sender, activity_uri).await,
            ActivityKind::Create => self.handle_create(activity, sender).await,
            ActivityKind::Update => self.handle_update(activity, sender).await,
            ActivityKind::Delete => self.handle_delete(activity, sender).await,
            ActivityKind::Undo => self.handle_undo(activity, sender).await,
            ActivityKind::Unknown(activity_type) => {
                tracing::debug!(activity_type = %activity_type, "Stored activity of unhandled type");
                Ok(())
            }
        }
    }

    async fn handle_follow(
        &self,
        activity: &Value,
        follower: &str,
        activity_uri: &str,
    ) -> Result<(), AppError> {
        let followee = required_object(activity)?;
        let follow = Relation::new(follower, &followee, Some(activity_uri));

        let local_followee = if self.directory.is_local_uri(&followee) {
            self.db.get_actor_by_uri(&followee).await?
        } else {
            None
        };

        let Some(local_followee) = local_followee else {
            self.db.upsert_follow(&follow, FollowState::Pending).await?;
            tracing::debug!(follower = %follower, followee = %followee, "Recorded follow of a non-local actor");
            return Ok(());
        };

        self.db.upsert_follow(&follow, FollowState::Accepted).await?;

        let accept = builder::accept(
            &builder::activity_id(&local_followee.uri),
            &local_followee.uri,
            activity.clone(),
        );
        let published = self.publisher.publish(&local_followee.id, accept).await?;

        tracing::info!(
            follower = %follower,
            followee = %local_followee.uri,
            accept_job = %published.job_id,
            "Accepted follow"
        );
        Ok(())
    }

    /// (follower, followee) of the Follow an Accept/Reject refers to
    async fn referenced_follow(
        &self,
        activity: &Value,
    ) -> Result<Option<(String, String)>, AppError> {
        if let Some(follow) = embedded_object(activity) {
            if let (Some(follower), Some(followee)) = (actor_uri(follow), object_uri(follow)) {
                return Ok(Some((follower, followee)));
            }
        }

        let Some(follow_uri) = object_uri(activity) else {
            return Ok(None);
        };
        let relation = self
            .db
            .get_relation_by_activity_uri(RelationKind::Follow, &follow_uri)
            .await?;
        Ok(relation.map(|relation| (relation.actor_uri, relation.object_uri)))
    }

    async fn handle_accept(&self, activity: &Value, sender: &str) -> Result<(), AppError> {
        let Some((follower, followee)) = self.referenced_follow(activity).await? else {
            tracing::warn!(actor = %sender, "Accept of an unknown follow");
            return Ok(());
        };
        if followee != sender {
            return Err(AppError::Forbidden);
        }

        if self.db.accept_follow(&follower, &followee).await? {
            tracing::info!(follower = %follower, followee = %followee, "Follow accepted");
        } else {
            tracing::warn!(follower = %follower, followee = %followee, "Accept of a follow that was never recorded");
        }
        Ok(())
    }

    async fn handle_reject(&self, activity: &Value, sender: &str) -> Result<(), AppError> {
        let Some((follower, followee)) = self.referenced_follow(activity).await? else {
            tracing::warn!(actor = %sender, "Reject of an unknown follow");
            return Ok(());
        };
        if followee != sender {
            return Err(AppError::Forbidden);
        }

        self.db
            .delete_relation(RelationKind::Follow, &follower, &followee)
            .await?;
        tracing::info!(follower = %follower, followee = %followee, "Follow rejected");
        Ok(())
    }

    async fn handle_relation(
        &self,
        kind: RelationKind,
        activity: &Value,
        sender: &str,
        activity_uri: &str,
    ) -> Result<(), AppError> {
        let object = required_object(activity)?;
        let relation = Relation::new(sender, &object, Some(activity_uri));

        if !self.db.insert_relation(kind, &relation).await? {
            tracing::debug!(actor = %sender, object = %object, relation = ?kind, "Relation already exists");
        }
        Ok(())
    }

    async fn handle_announce(
        &self,
        activity: &Value,
        sender: &str,
        activity_uri: &str,
    ) -> Result<(), AppError> {
        self.handle_relation(RelationKind::Announce, activity, sender, activity_uri)
            .await?;

        // An embedded copy only seeds the cache; it never replaces what we hold
        if let Some(shadow) = embedded_object(activity).and_then(ShadowObject::from_document) {
            self.db.insert_object_if_absent(&shadow).await?;
        }
        Ok(())
    }

    async fn handle_block(
        &self,
        activity: &Value,
        sender: &str,
        activity_uri: &str,
    ) -> Result<(), AppError> {
        let blocked = required_object(activity)?;
        self.handle_relation(RelationKind::Block, activity, sender, activity_uri)
            .await?;

        if self
            .db
            .delete_relation(RelationKind::Follow, &blocked, sender)
            .await?
        {
            tracing::info!(blocker = %sender, blocked = %blocked, "Removed follow of blocking actor");
        }
        Ok(())
    }

    /// Store the created object.
    ///
    /// An embedded object must be authored by the sender and may not take
    /// over an object already stored under another author.
    async fn handle_create(&self, activity: &Value, sender: &str) -> Result<(), AppError> {
        if let Some(object) = embedded_object(activity) {
            let mut shadow = ShadowObject::from_document(object).ok_or_else(|| {
                AppError::Validation("Created object has no id".to_string())
            })?;
            match shadow.attributed_to.as_deref() {
                Some(author) if author != sender => {
                    tracing::warn!(actor = %sender, author = %author, object = %shadow.uri, "Create of an object attributed to someone else");
                    return Err(AppError::Forbidden);
                }
                Some(_) => {}
                None => shadow.attributed_to = Some(sender.to_string()),
            }
            self.ensure_attributed(&shadow.uri, sender).await?;

            if !self.db.upsert_object(&shadow).await? {
                tracing::debug!(object = %shadow.uri, "Ignoring create of a deleted object");
            }
            return Ok(());
        }

        let object = required_object(activity)?;
        if self
            .resolver
            .fetch_and_store_remote_object(&object)
            .await?
            .is_none()
        {
            tracing::warn!(object = %object, "Created object could not be fetched");
        }
        Ok(())
    }

    async fn handle_update(&self, activity: &Value, sender: &str) -> Result<(), AppError> {
        let object = required_object(activity)?;

        if object == sender {
            match embedded_object(activity) {
                Some(document) => {
                    self.directory.store_remote_actor(sender, document).await?;
                }
                None => {
                    self.directory.refresh_remote_actor(sender).await?;
                }
            }
            tracing::info!(actor = %sender, "Refreshed actor from update");
            return Ok(());
        }

        let Some(document) = embedded_object(activity) else {
            // Bare URI: re-fetch the current version
            self.ensure_attributed(&object, sender).await?;
            self.resolver.fetch_and_store_remote_object(&object).await?;
            return Ok(());
        };
        let shadow = ShadowObject::from_document(document)
            .ok_or_else(|| AppError::Validation("Updated object has no id".to_string()))?;

        self.ensure_attributed(&object, sender).await?;
        if let Some(author) = shadow.attributed_to.as_deref() {
            if author != sender {
                return Err(AppError::Forbidden);
            }
        }

        self.db.upsert_object(&shadow).await?;
        Ok(())
    }

    async fn handle_delete(&self, activity: &Value, sender: &str) -> Result<(), AppError> {
        let object = required_object(activity)?;

        if object == sender {
            tracing::info!(actor = %sender, "Remote actor deleted itself");
            return Ok(());
        }

        if self.db.get_object_by_uri(&object).await?.is_none() {
            tracing::debug!(object = %object, "Delete of an unknown object");
            return Ok(());
        }
        self.ensure_attributed(&object, sender).await?;

        if self.db.tombstone_object(&object).await? {
            tracing::info!(object = %object, "Object tombstoned");
        }
        Ok(())
    }

    async fn handle_undo(&self, activity: &Value, sender: &str) -> Result<(), AppError> {
        let original = activity
            .get("object")
            .ok_or_else(|| AppError::Validation("Undo has no object".to_string()))?;

        if reverse_relation(&self.db, sender, original).await? {
            tracing::info!(actor = %sender, "Relation undone");
        }
        Ok(())
    }

    /// Fail with `Forbidden` when a stored object belongs to someone else
    async fn ensure_attributed(&self, object: &str, sender: &str) -> Result<(), AppError> {
        let stored = self.db.get_object_by_uri(object).await?;
        match stored.and_then(|stored| stored.attributed_to) {
            Some(author) if author != sender => Err(AppError::Forbidden),
            _ => Ok(()),
        }
    }
}

fn validate(activity: &Value) -> Result<(ActivityKind, String), AppError> {
    if !activity.is_object() {
        return Err(AppError::Validation(
            "Activity must be a JSON object".to_string(),
        ));
    }
    let kind = ActivityKind::of(activity)
        .ok_or_else(|| AppError::Validation("Activity has no type".to_string()))?;
    let sender = actor_uri(activity)
        .ok_or_else(|| AppError::Validation("Activity has no actor".to_string()))?;
    Ok((kind, sender))
}

fn required_object(activity: &Value) -> Result<String, AppError> {
    object_uri(activity).ok_or_else(|| AppError::Validation("Activity has no object".to_string()))
}
