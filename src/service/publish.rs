//! Activity origination
//!
//! Local actors publish activities through [`PublishService`]: the document
//! is completed, logged as outbound, its relation side effects are applied
//! locally and an outbox job is enqueued for delivery.

use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use super::ActorDirectory;
use crate::data::{
    ActivityDirection, ActivityRecord, Database, EntityId, FollowState, Relation, RelationKind,
};
use crate::error::AppError;
use crate::federation::{
    ACTIVITY_STREAMS_CONTEXT, ActivityKind, activity_id, object_uri, relation_kind,
    reverse_relation,
};
use crate::jobs::{JobPayload, JobQueue, OutboxJob};

/// A published activity and its delivery job
#[derive(Debug, Clone)]
pub struct Published {
    pub job_id: String,
    pub activity_uri: String,
    pub activity: Value,
}

pub struct PublishService {
    db: Arc<Database>,
    directory: Arc<ActorDirectory>,
    queue: JobQueue,
}

impl PublishService {
    pub fn new(db: Arc<Database>, directory: Arc<ActorDirectory>, queue: JobQueue) -> Self {
        Self {
            db,
            directory,
            queue,
        }
    }

    /// Publish an activity on behalf of a local actor.
    ///
    /// `actor` is always set to the publishing actor; `id` and `@context`
    /// are filled in when missing.
    ///
    /// # Errors
    /// - `NotFound` for an unknown actor id
    /// - `Forbidden` when the actor is not local
    /// - `Validation` for documents without a `type`
    /// - `Conflict` when an activity with the same id was already logged
    pub async fn publish(&self, actor_id: &str, mut activity: Value) -> Result<Published, AppError> {
        let actor = self.directory.find_by_id(actor_id).await?;
        if !actor.is_local {
            return Err(AppError::Forbidden);
        }

        let Some(document) = activity.as_object_mut() else {
            return Err(AppError::Validation(
                "Activity must be a JSON object".to_string(),
            ));
        };
        document.insert("actor".to_string(), json!(actor.uri));
        if !document.get("id").is_some_and(Value::is_string) {
            document.insert("id".to_string(), json!(activity_id(&actor.uri)));
        }
        document
            .entry("@context")
            .or_insert_with(|| json!(ACTIVITY_STREAMS_CONTEXT));

        let kind = ActivityKind::of(&activity)
            .ok_or_else(|| AppError::Validation("Activity has no type".to_string()))?;
        let activity_uri = crate::federation::canonical_activity_uri(&activity);

        let record = ActivityRecord {
            id: EntityId::new().0,
            uri: activity_uri.clone(),
            activity_type: kind.as_str().to_string(),
            actor_uri: actor.uri.clone(),
            object_uri: object_uri(&activity),
            payload: activity.to_string(),
            direction: ActivityDirection::Outbound.as_str().to_string(),
            recipient_actor_id: None,
            created_at: Utc::now(),
        };
        if !self.db.insert_activity(&record).await? {
            return Err(AppError::Conflict(format!(
                "activity {} already exists",
                activity_uri
            )));
        }

        self.apply_local_effects(&kind, &activity, &actor.uri, &activity_uri)
            .await?;

        let job_id = self
            .queue
            .enqueue(JobPayload::Outbox(OutboxJob {
                activity: activity.clone(),
                actor_id: actor.id.clone(),
                activity_id: Some(record.id),
            }))
            .await?;

        tracing::info!(
            actor = %actor.uri,
            activity_uri = %activity_uri,
            activity_type = %kind.as_str(),
            job_id = %job_id,
            "Published activity"
        );

        Ok(Published {
            job_id,
            activity_uri,
            activity,
        })
    }

    async fn apply_local_effects(
        &self,
        kind: &ActivityKind,
        activity: &Value,
        actor_uri: &str,
        activity_uri: &str,
    ) -> Result<(), AppError> {
        match kind {
            ActivityKind::Undo => {
                if let Some(original) = activity.get("object") {
                    reverse_relation(&self.db, actor_uri, original).await?;
                }
            }
            ActivityKind::Follow => {
                let Some(followee) = object_uri(activity) else {
                    return Ok(());
                };
                let follow = Relation::new(actor_uri, &followee, Some(activity_uri));
                self.db.upsert_follow(&follow, FollowState::Pending).await?;
            }
            other => {
                let (Some(relation), Some(object)) = (relation_kind(other), object_uri(activity))
                else {
                    return Ok(());
                };
                let inserted = self
                    .db
                    .insert_relation(relation, &Relation::new(actor_uri, &object, Some(activity_uri)))
                    .await?;
                if inserted && relation == RelationKind::Block {
                    self.db
                        .delete_relation(RelationKind::Follow, &object, actor_uri)
                        .await?;
                }
            }
        }
        Ok(())
    }
}
