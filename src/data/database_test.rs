//! Database tests

use super::*;
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn test_actor(handle: &str, is_local: bool) -> Actor {
    let uri = format!("https://example.com/users/{}", handle);
    Actor {
        id: EntityId::new().0,
        owner_id: is_local.then(|| "owner-1".to_string()),
        uri: uri.clone(),
        handle: handle.to_string(),
        display_name: Some("Test User".to_string()),
        summary: None,
        inbox_uri: format!("{}/inbox", uri),
        shared_inbox_uri: None,
        outbox_uri: Some(format!("{}/outbox", uri)),
        followers_uri: Some(format!("{}/followers", uri)),
        following_uri: None,
        liked_uri: None,
        public_key_pem: "test_public_key".to_string(),
        is_local,
        profile_json: None,
        profile_refreshed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_job(id: &str, next_run_at_ms: i64) -> JobRecord {
    JobRecord {
        id: id.to_string(),
        kind: "outbox".to_string(),
        payload: "{}".to_string(),
        status: JobStatus::Pending.as_str().to_string(),
        attempts: 0,
        max_attempts: 3,
        next_run_at_ms,
        last_error: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_actor_insert_and_lookup() {
    let (db, _temp_dir) = create_test_db().await;

    let actor = test_actor("alice", true);
    db.insert_actor(&actor, Some("test_private_key")).await.unwrap();

    let by_id = db.get_actor_by_id(&actor.id).await.unwrap().unwrap();
    assert_eq!(by_id.handle, "alice");
    assert!(by_id.is_local);

    let by_handle = db.get_actor_by_handle("ALICE").await.unwrap();
    assert!(by_handle.is_some());

    let by_uri = db.get_actor_by_uri(&actor.uri).await.unwrap();
    assert!(by_uri.is_some());

    let key = db.get_actor_private_key(&actor.id).await.unwrap();
    assert_eq!(key.as_deref(), Some("test_private_key"));
}

#[tokio::test]
async fn test_duplicate_handle_is_conflict() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_actor(&test_actor("alice", true), Some("k"))
        .await
        .unwrap();

    let mut duplicate = test_actor("alice", true);
    duplicate.uri = "https://example.com/users/alice-2".to_string();
    let result = db.insert_actor(&duplicate, Some("k")).await;
    assert!(matches!(result, Err(crate::error::AppError::Conflict(_))));
}

#[tokio::test]
async fn test_remote_actor_upsert_refreshes_fields() {
    let (db, _temp_dir) = create_test_db().await;

    let mut remote = test_actor("bob@remote.example", false);
    remote.uri = "https://remote.example/users/bob".to_string();
    let stored = db.upsert_remote_actor(&remote).await.unwrap();
    assert!(!stored.is_local);

    let mut refreshed = remote.clone();
    refreshed.id = EntityId::new().0;
    refreshed.public_key_pem = "rotated_key".to_string();
    let stored_again = db.upsert_remote_actor(&refreshed).await.unwrap();

    assert_eq!(stored_again.id, stored.id);
    assert_eq!(stored_again.public_key_pem, "rotated_key");
    assert!(db.get_actor_private_key(&stored.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_activity_log_is_append_only() {
    let (db, _temp_dir) = create_test_db().await;

    let record = ActivityRecord {
        id: EntityId::new().0,
        uri: "https://remote.example/activities/1".to_string(),
        activity_type: "Like".to_string(),
        actor_uri: "https://remote.example/users/bob".to_string(),
        object_uri: Some("https://example.com/notes/1".to_string()),
        payload: r#"{"type":"Like"}"#.to_string(),
        direction: ActivityDirection::Inbound.as_str().to_string(),
        recipient_actor_id: None,
        created_at: Utc::now(),
    };

    assert!(db.insert_activity(&record).await.unwrap());

    let mut again = record.clone();
    again.id = EntityId::new().0;
    assert!(!db.insert_activity(&again).await.unwrap());

    let stored = db
        .get_activity_by_uri(&record.uri)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, record.id);
    assert_eq!(stored.payload_json().unwrap()["type"], "Like");
}

#[tokio::test]
async fn test_relation_insert_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;

    let like = Relation::new(
        "https://remote.example/users/bob",
        "https://example.com/notes/1",
        Some("https://remote.example/likes/1"),
    );
    assert!(db.insert_relation(RelationKind::Like, &like).await.unwrap());

    let repeat = Relation::new(
        "https://remote.example/users/bob",
        "https://example.com/notes/1",
        Some("https://remote.example/likes/2"),
    );
    assert!(!db.insert_relation(RelationKind::Like, &repeat).await.unwrap());

    assert_eq!(
        db.count_relations(RelationKind::Like, "https://example.com/notes/1")
            .await
            .unwrap(),
        1
    );

    let by_activity = db
        .get_relation_by_activity_uri(RelationKind::Like, "https://remote.example/likes/1")
        .await
        .unwrap();
    assert!(by_activity.is_some());

    assert!(
        db.delete_relation(
            RelationKind::Like,
            "https://remote.example/users/bob",
            "https://example.com/notes/1"
        )
        .await
        .unwrap()
    );
    assert!(
        !db.has_relation(
            RelationKind::Like,
            "https://remote.example/users/bob",
            "https://example.com/notes/1"
        )
        .await
        .unwrap()
    );
}

#[tokio::test]
async fn test_follow_state_transitions() {
    let (db, _temp_dir) = create_test_db().await;

    let follower = "https://remote.example/users/bob";
    let followee = "https://example.com/users/alice";

    let follow = Relation::new(follower, followee, Some("https://remote.example/follows/1"));
    db.upsert_follow(&follow, FollowState::Pending).await.unwrap();
    assert_eq!(
        db.get_follow_state(follower, followee).await.unwrap(),
        Some(FollowState::Pending)
    );
    assert!(db.get_follower_uris(followee).await.unwrap().is_empty());

    assert!(db.accept_follow(follower, followee).await.unwrap());
    assert_eq!(db.get_follower_uris(followee).await.unwrap(), vec![follower]);

    // A repeated Follow refreshes the activity URI without downgrading
    let repeat = Relation::new(follower, followee, Some("https://remote.example/follows/2"));
    db.upsert_follow(&repeat, FollowState::Pending).await.unwrap();
    assert_eq!(
        db.get_follow_state(follower, followee).await.unwrap(),
        Some(FollowState::Accepted)
    );
    let stored = db
        .get_relation_by_activity_uri(RelationKind::Follow, "https://remote.example/follows/2")
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_tombstoned_object_is_not_resurrected() {
    let (db, _temp_dir) = create_test_db().await;

    let note = serde_json::json!({
        "id": "https://remote.example/notes/1",
        "type": "Note",
        "attributedTo": "https://remote.example/users/bob",
        "content": "hello"
    });
    let object = ShadowObject::from_document(&note).unwrap();
    assert!(db.upsert_object(&object).await.unwrap());

    assert!(db.tombstone_object(&object.uri).await.unwrap());
    assert!(!db.tombstone_object(&object.uri).await.unwrap());

    let fresh = ShadowObject::from_document(&note).unwrap();
    assert!(!db.upsert_object(&fresh).await.unwrap());

    let stored = db.get_object_by_uri(&object.uri).await.unwrap().unwrap();
    assert!(stored.deleted);
    assert!(stored.payload.contains("Tombstone"));
    assert_eq!(
        stored.attributed_to.as_deref(),
        Some("https://remote.example/users/bob")
    );
}

#[tokio::test]
async fn test_object_author_is_never_replaced() {
    let (db, _temp_dir) = create_test_db().await;

    let original = ShadowObject::from_document(&serde_json::json!({
        "id": "https://remote.example/notes/2",
        "type": "Note",
        "attributedTo": "https://remote.example/users/bob",
        "content": "hello"
    }))
    .unwrap();
    assert!(db.upsert_object(&original).await.unwrap());

    let takeover = ShadowObject::from_document(&serde_json::json!({
        "id": "https://remote.example/notes/2",
        "type": "Note",
        "attributedTo": "https://evil.example/users/mallory",
        "content": "mine"
    }))
    .unwrap();
    assert!(!db.upsert_object(&takeover).await.unwrap());
    assert!(!db.insert_object_if_absent(&takeover).await.unwrap());

    let edit = ShadowObject::from_document(&serde_json::json!({
        "id": "https://remote.example/notes/2",
        "type": "Note",
        "attributedTo": "https://remote.example/users/bob",
        "content": "edited"
    }))
    .unwrap();
    assert!(db.upsert_object(&edit).await.unwrap());

    let stored = db.get_object_by_uri(&original.uri).await.unwrap().unwrap();
    assert_eq!(
        stored.attributed_to.as_deref(),
        Some("https://remote.example/users/bob")
    );
    assert!(stored.payload.contains("edited"));
}

#[tokio::test]
async fn test_processed_activity_insert_once() {
    let (db, _temp_dir) = create_test_db().await;

    let uri = "https://remote.example/activities/42";
    assert!(!db.is_activity_processed(uri).await.unwrap());
    assert!(db.insert_processed_activity(uri).await.unwrap());
    assert!(!db.insert_processed_activity(uri).await.unwrap());
    assert!(db.is_activity_processed(uri).await.unwrap());
}

#[tokio::test]
async fn test_delivery_receipts() {
    let (db, _temp_dir) = create_test_db().await;

    let activity = "https://example.com/activities/1";
    assert!(
        db.insert_delivery_receipt(activity, "https://a.example/inbox")
            .await
            .unwrap()
    );
    assert!(
        !db.insert_delivery_receipt(activity, "https://a.example/inbox")
            .await
            .unwrap()
    );
    db.insert_delivery_receipt(activity, "https://b.example/inbox")
        .await
        .unwrap();

    let delivered = db.get_delivered_inboxes(activity).await.unwrap();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.contains("https://b.example/inbox"));
}

#[tokio::test]
async fn test_job_claim_is_exclusive() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_job(&test_job("job-1", 1_000)).await.unwrap();
    db.insert_job(&test_job("job-2", 5_000)).await.unwrap();

    let due = db.get_due_job_ids(2_000, 10).await.unwrap();
    assert_eq!(due, vec!["job-1".to_string()]);

    let claimed = db.claim_job("job-1").await.unwrap().unwrap();
    assert_eq!(claimed.attempts, 1);
    assert_eq!(claimed.status, "running");
    assert!(db.claim_job("job-1").await.unwrap().is_none());

    db.reschedule_job("job-1", 3_000, "HTTP 503").await.unwrap();
    let rescheduled = db.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(rescheduled.status, "pending");
    assert_eq!(rescheduled.last_error.as_deref(), Some("HTTP 503"));

    db.claim_job("job-1").await.unwrap().unwrap();
    db.kill_job("job-1", "gave up").await.unwrap();
    let dead = db.get_jobs_by_status(JobStatus::Dead, 10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 2);
}

#[tokio::test]
async fn test_reset_running_jobs() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_job(&test_job("job-1", 0)).await.unwrap();
    db.claim_job("job-1").await.unwrap().unwrap();
    assert_eq!(db.count_jobs("outbox", JobStatus::Running).await.unwrap(), 1);

    assert_eq!(db.reset_running_jobs().await.unwrap(), 1);
    assert_eq!(db.count_jobs("outbox", JobStatus::Pending).await.unwrap(), 1);
}
