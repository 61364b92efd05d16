//! SQLite database operations
//!
//! All database access goes through this module.
//! Relation and ledger inserts rely on unique constraints plus
//! `INSERT OR IGNORE`, so concurrent writers never need read-then-write.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::Path;

use super::models::*;
use crate::error::AppError;

const ACTOR_COLUMNS: &str = "id, owner_id, uri, handle, display_name, summary, inbox_uri, \
     shared_inbox_uri, outbox_uri, followers_uri, following_uri, liked_uri, public_key_pem, \
     is_local, profile_json, profile_refreshed_at, created_at, updated_at";

const RELATION_COLUMNS: &str = "id, actor_uri, object_uri, activity_uri, created_at";

/// Map a unique-constraint violation to `Conflict`, everything else to `Database`.
fn map_unique_violation(error: sqlx::Error, what: &str) -> AppError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            AppError::Conflict(format!("{what} already exists"))
        }
        _ => AppError::Database(error),
    }
}

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // =========================================================================
    // Actors
    // =========================================================================

    /// Insert a new actor.
    ///
    /// `private_key_pem` is only given for locally owned actors.
    ///
    /// # Errors
    /// `Conflict` when the handle or URI is already taken
    pub async fn insert_actor(
        &self,
        actor: &Actor,
        private_key_pem: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO actors (
                id, owner_id, uri, handle, display_name, summary, inbox_uri,
                shared_inbox_uri, outbox_uri, followers_uri, following_uri, liked_uri,
                public_key_pem, private_key_pem, is_local, profile_json,
                profile_refreshed_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&actor.id)
        .bind(&actor.owner_id)
        .bind(&actor.uri)
        .bind(&actor.handle)
        .bind(&actor.display_name)
        .bind(&actor.summary)
        .bind(&actor.inbox_uri)
        .bind(&actor.shared_inbox_uri)
        .bind(&actor.outbox_uri)
        .bind(&actor.followers_uri)
        .bind(&actor.following_uri)
        .bind(&actor.liked_uri)
        .bind(&actor.public_key_pem)
        .bind(private_key_pem)
        .bind(actor.is_local)
        .bind(&actor.profile_json)
        .bind(actor.profile_refreshed_at)
        .bind(actor.created_at)
        .bind(actor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "actor"))?;

        Ok(())
    }

    /// Insert or refresh a remote shadow actor, keyed by URI.
    ///
    /// Local actors are never overwritten. Returns the stored row.
    pub async fn upsert_remote_actor(&self, actor: &Actor) -> Result<Actor, AppError> {
        sqlx::query(
            r#"
            INSERT INTO actors (
                id, owner_id, uri, handle, display_name, summary, inbox_uri,
                shared_inbox_uri, outbox_uri, followers_uri, following_uri, liked_uri,
                public_key_pem, private_key_pem, is_local, profile_json,
                profile_refreshed_at, created_at, updated_at
            )
            VALUES (?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, ?, ?, ?, ?)
            ON CONFLICT(uri) DO UPDATE SET
                display_name = excluded.display_name,
                summary = excluded.summary,
                inbox_uri = excluded.inbox_uri,
                shared_inbox_uri = excluded.shared_inbox_uri,
                outbox_uri = excluded.outbox_uri,
                followers_uri = excluded.followers_uri,
                following_uri = excluded.following_uri,
                liked_uri = excluded.liked_uri,
                public_key_pem = excluded.public_key_pem,
                profile_json = excluded.profile_json,
                profile_refreshed_at = excluded.profile_refreshed_at,
                updated_at = excluded.updated_at
            WHERE actors.is_local = 0
            "#,
        )
        .bind(&actor.id)
        .bind(&actor.uri)
        .bind(&actor.handle)
        .bind(&actor.display_name)
        .bind(&actor.summary)
        .bind(&actor.inbox_uri)
        .bind(&actor.shared_inbox_uri)
        .bind(&actor.outbox_uri)
        .bind(&actor.followers_uri)
        .bind(&actor.following_uri)
        .bind(&actor.liked_uri)
        .bind(&actor.public_key_pem)
        .bind(&actor.profile_json)
        .bind(actor.profile_refreshed_at)
        .bind(actor.created_at)
        .bind(actor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "actor handle"))?;

        self.get_actor_by_uri(&actor.uri)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get_actor_by_id(&self, id: &str) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(actor)
    }

    pub async fn get_actor_by_handle(&self, handle: &str) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors WHERE handle = ? COLLATE NOCASE"
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(actor)
    }

    pub async fn get_actor_by_uri(&self, uri: &str) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors WHERE uri = ?"
        ))
        .bind(uri)
        .fetch_optional(&self.pool)
        .await?;

        Ok(actor)
    }

    /// Read the private key of a local actor.
    ///
    /// Only the key capability should call this.
    pub async fn get_actor_private_key(&self, actor_id: &str) -> Result<Option<String>, AppError> {
        let key = sqlx::query_scalar::<_, Option<String>>(
            "SELECT private_key_pem FROM actors WHERE id = ? AND is_local = 1",
        )
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key.flatten())
    }

    /// Store a freshly built profile document on the actor row
    pub async fn update_actor_profile_cache(
        &self,
        actor_id: &str,
        profile_json: &str,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE actors SET profile_json = ?, profile_refreshed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(profile_json)
        .bind(refreshed_at)
        .bind(refreshed_at)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Activity log
    // =========================================================================

    /// Append an activity. Returns false when the URI is already logged.
    pub async fn insert_activity(&self, activity: &ActivityRecord) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO activities (
                id, uri, activity_type, actor_uri, object_uri, payload,
                direction, recipient_actor_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.id)
        .bind(&activity.uri)
        .bind(&activity.activity_type)
        .bind(&activity.actor_uri)
        .bind(&activity.object_uri)
        .bind(&activity.payload)
        .bind(&activity.direction)
        .bind(&activity.recipient_actor_id)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_activity_by_uri(&self, uri: &str) -> Result<Option<ActivityRecord>, AppError> {
        let activity =
            sqlx::query_as::<_, ActivityRecord>("SELECT * FROM activities WHERE uri = ?")
                .bind(uri)
                .fetch_optional(&self.pool)
                .await?;

        Ok(activity)
    }

    /// Activities sent by or received from an actor, newest first
    pub async fn get_activities_by_actor(
        &self,
        actor_uri: &str,
        limit: i64,
    ) -> Result<Vec<ActivityRecord>, AppError> {
        let activities = sqlx::query_as::<_, ActivityRecord>(
            "SELECT * FROM activities WHERE actor_uri = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(actor_uri)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Insert a Like/Announce/Block relation.
    ///
    /// Returns false when the (actor, object) pair already exists.
    pub async fn insert_relation(
        &self,
        kind: RelationKind,
        relation: &Relation,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} ({RELATION_COLUMNS}) VALUES (?, ?, ?, ?, ?)",
            kind.table()
        ))
        .bind(&relation.id)
        .bind(&relation.actor_uri)
        .bind(&relation.object_uri)
        .bind(&relation.activity_uri)
        .bind(relation.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a relation. Returns false when nothing matched.
    pub async fn delete_relation(
        &self,
        kind: RelationKind,
        actor_uri: &str,
        object_uri: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE actor_uri = ? AND object_uri = ?",
            kind.table()
        ))
        .bind(actor_uri)
        .bind(object_uri)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn has_relation(
        &self,
        kind: RelationKind,
        actor_uri: &str,
        object_uri: &str,
    ) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE actor_uri = ? AND object_uri = ?",
            kind.table()
        ))
        .bind(actor_uri)
        .bind(object_uri)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Number of relations of a kind pointing at an object
    pub async fn count_relations(
        &self,
        kind: RelationKind,
        object_uri: &str,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE object_uri = ?",
            kind.table()
        ))
        .bind(object_uri)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Find the relation created by a given activity
    pub async fn get_relation_by_activity_uri(
        &self,
        kind: RelationKind,
        activity_uri: &str,
    ) -> Result<Option<Relation>, AppError> {
        let relation = sqlx::query_as::<_, Relation>(&format!(
            "SELECT {RELATION_COLUMNS} FROM {} WHERE activity_uri = ?",
            kind.table()
        ))
        .bind(activity_uri)
        .fetch_optional(&self.pool)
        .await?;

        Ok(relation)
    }

    /// Insert or refresh a Follow.
    ///
    /// A repeated Follow updates the activity URI; an accepted follow is
    /// never downgraded to pending.
    pub async fn upsert_follow(
        &self,
        follow: &Relation,
        state: FollowState,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO follows (id, actor_uri, object_uri, activity_uri, state, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(actor_uri, object_uri) DO UPDATE SET
                activity_uri = COALESCE(excluded.activity_uri, follows.activity_uri),
                state = CASE
                    WHEN follows.state = 'accepted' THEN 'accepted'
                    ELSE excluded.state
                END
            "#,
        )
        .bind(&follow.id)
        .bind(&follow.actor_uri)
        .bind(&follow.object_uri)
        .bind(&follow.activity_uri)
        .bind(state.as_str())
        .bind(follow.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_follow_state(
        &self,
        actor_uri: &str,
        object_uri: &str,
    ) -> Result<Option<FollowState>, AppError> {
        let state = sqlx::query_scalar::<_, String>(
            "SELECT state FROM follows WHERE actor_uri = ? AND object_uri = ?",
        )
        .bind(actor_uri)
        .bind(object_uri)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state.as_deref().and_then(FollowState::parse))
    }

    /// Mark a follow accepted. Returns false when no such follow exists.
    pub async fn accept_follow(&self, actor_uri: &str, object_uri: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE follows SET state = 'accepted' WHERE actor_uri = ? AND object_uri = ?",
        )
        .bind(actor_uri)
        .bind(object_uri)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// URIs of actors with an accepted follow of `object_uri`, oldest first
    pub async fn get_follower_uris(&self, object_uri: &str) -> Result<Vec<String>, AppError> {
        let followers = sqlx::query_scalar::<_, String>(
            "SELECT actor_uri FROM follows WHERE object_uri = ? AND state = 'accepted' ORDER BY created_at, id",
        )
        .bind(object_uri)
        .fetch_all(&self.pool)
        .await?;

        Ok(followers)
    }

    // =========================================================================
    // Shadow objects
    // =========================================================================

    /// Insert or refresh a shadow object.
    ///
    /// Tombstoned objects stay deleted, and an object never changes author
    /// once one is recorded.
    ///
    /// Returns false when nothing was written.
    pub async fn upsert_object(&self, object: &ShadowObject) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO objects (
                id, uri, object_type, attributed_to, payload, deleted, fetched_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(uri) DO UPDATE SET
                object_type = excluded.object_type,
                attributed_to = COALESCE(objects.attributed_to, excluded.attributed_to),
                payload = excluded.payload,
                fetched_at = excluded.fetched_at,
                updated_at = excluded.updated_at
            WHERE objects.deleted = 0
                AND (
                    objects.attributed_to IS NULL
                    OR excluded.attributed_to IS NULL
                    OR objects.attributed_to = excluded.attributed_to
                )
            "#,
        )
        .bind(&object.id)
        .bind(&object.uri)
        .bind(&object.object_type)
        .bind(&object.attributed_to)
        .bind(&object.payload)
        .bind(object.fetched_at)
        .bind(object.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Store a shadow object only when its URI is unknown.
    pub async fn insert_object_if_absent(&self, object: &ShadowObject) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO objects (
                id, uri, object_type, attributed_to, payload, deleted, fetched_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&object.id)
        .bind(&object.uri)
        .bind(&object.object_type)
        .bind(&object.attributed_to)
        .bind(&object.payload)
        .bind(object.fetched_at)
        .bind(object.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_object_by_uri(&self, uri: &str) -> Result<Option<ShadowObject>, AppError> {
        let object = sqlx::query_as::<_, ShadowObject>("SELECT * FROM objects WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&self.pool)
            .await?;

        Ok(object)
    }

    /// Replace an object's payload with a tombstone.
    ///
    /// Returns false when the object is unknown or already deleted.
    pub async fn tombstone_object(&self, uri: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        let tombstone = serde_json::json!({
            "id": uri,
            "type": "Tombstone",
            "deleted": now.to_rfc3339(),
        });
        let result = sqlx::query(
            "UPDATE objects SET deleted = 1, payload = ?, updated_at = ? WHERE uri = ? AND deleted = 0",
        )
        .bind(tombstone.to_string())
        .bind(now)
        .bind(uri)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Processed-activity ledger
    // =========================================================================

    /// Record an activity URI as processed.
    ///
    /// A single conditional insert: true only for the first caller.
    pub async fn insert_processed_activity(&self, activity_uri: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed_activities (activity_uri, processed_at) VALUES (?, ?)",
        )
        .bind(activity_uri)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn is_activity_processed(&self, activity_uri: &str) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM processed_activities WHERE activity_uri = ?",
        )
        .bind(activity_uri)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    // =========================================================================
    // Delivery receipts
    // =========================================================================

    pub async fn insert_delivery_receipt(
        &self,
        activity_uri: &str,
        inbox_uri: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO delivery_receipts (activity_uri, inbox_uri, delivered_at) VALUES (?, ?, ?)",
        )
        .bind(activity_uri)
        .bind(inbox_uri)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Inboxes that already acknowledged an activity
    pub async fn get_delivered_inboxes(
        &self,
        activity_uri: &str,
    ) -> Result<HashSet<String>, AppError> {
        let inboxes = sqlx::query_scalar::<_, String>(
            "SELECT inbox_uri FROM delivery_receipts WHERE activity_uri = ?",
        )
        .bind(activity_uri)
        .fetch_all(&self.pool)
        .await?;

        Ok(inboxes.into_iter().collect())
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    pub async fn insert_job(&self, job: &JobRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, payload, status, attempts, max_attempts,
                next_run_at_ms, last_error, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.kind)
        .bind(&job.payload)
        .bind(&job.status)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.next_run_at_ms)
        .bind(&job.last_error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<JobRecord>, AppError> {
        let job = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    /// Ids of pending jobs whose scheduled time has passed, oldest first
    pub async fn get_due_job_ids(&self, now_ms: i64, limit: i64) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM jobs
            WHERE status = 'pending' AND next_run_at_ms <= ?
            ORDER BY next_run_at_ms, id
            LIMIT ?
            "#,
        )
        .bind(now_ms)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Move a pending job to running and count the attempt.
    ///
    /// Returns None when another worker claimed it first.
    pub async fn claim_job(&self, id: &str) -> Result<Option<JobRecord>, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running', attempts = attempts + 1, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() != 1 {
            return Ok(None);
        }

        self.get_job(id).await
    }

    pub async fn complete_job(&self, id: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE jobs SET status = 'completed', last_error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Put a running job back to pending for a later attempt
    pub async fn reschedule_job(
        &self,
        id: &str,
        next_run_at_ms: i64,
        error: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', next_run_at_ms = ?, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(next_run_at_ms)
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Dead-letter a job
    pub async fn kill_job(&self, id: &str, error: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE jobs SET status = 'dead', last_error = ?, updated_at = ? WHERE id = ?")
            .bind(error)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_jobs_by_status(
        &self,
        status: JobStatus,
        limit: i64,
    ) -> Result<Vec<JobRecord>, AppError> {
        let jobs = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE status = ? ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    pub async fn count_jobs(&self, kind: &str, status: JobStatus) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE kind = ? AND status = ?")
                .bind(kind)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Return jobs left `running` by a crashed process to `pending`
    pub async fn reset_running_jobs(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'pending', updated_at = ? WHERE status = 'running'",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
