//! E2E tests for the outbound path
//!
//! Publish → outbox job → recipient expansion → signed fan-out, retries
//! and dead letters.

mod common;

use common::{MockPeer, TestServer};
use fedcore::data::{Actor, JobStatus};
use fedcore::federation::{activity_id, builder, verify_request};
use serde_json::{Value, json};
use std::sync::Once;

static METRICS: Once = Once::new();

/// Have each named peer actor follow `alice` and drain the Accept replies.
async fn follow(server: &TestServer, peer: &MockPeer, names: &[&str], alice: &Actor) {
    for name in names {
        let follow = builder::follow(
            &format!("{}/follows/{}", peer.base, name),
            &peer.actor_uri(name),
            &alice.uri,
        );
        let response = peer
            .post_signed(&server.client, &server.url("/users/alice/inbox"), name, &follow)
            .await;
        assert_eq!(response.status(), 202);
    }
    assert_eq!(server.run_jobs().await, names.len());
    assert_eq!(server.run_jobs().await, names.len());
}

fn creates(peer: &MockPeer, name: &str) -> Vec<Value> {
    peer.received_by(name)
        .iter()
        .map(|received| received.json())
        .filter(|activity| activity["type"] == "Create")
        .collect()
}

async fn publish_note(server: &TestServer, alice: &Actor, content: &str) -> Value {
    let followers = alice.followers_uri.as_deref().unwrap();
    let note = builder::public_note(
        &format!("{}/notes/{}", alice.uri, content),
        &alice.uri,
        followers,
        content,
    );
    let create = builder::create(&activity_id(&alice.uri), &alice.uri, note);
    server
        .state
        .publisher
        .publish(&alice.id, create)
        .await
        .unwrap()
        .activity
}

#[tokio::test]
async fn test_public_note_reaches_each_follower_once() {
    let server = TestServer::new().await;
    let alice = server.create_actor("alice").await;
    let peer = MockPeer::start(&["bob", "carol"]).await;
    follow(&server, &peer, &["bob", "carol"], &alice).await;

    let published = publish_note(&server, &alice, "hello").await;
    assert_eq!(server.run_jobs().await, 1);

    for name in ["bob", "carol"] {
        let received = creates(&peer, name);
        assert_eq!(received.len(), 1, "{} should receive the Create once", name);
        assert_eq!(received[0]["id"], published["id"]);
        assert_eq!(received[0]["object"]["content"], "hello");
    }

    // Nothing left to do
    assert_eq!(server.run_jobs().await, 0);
    assert_eq!(
        server
            .state
            .db
            .count_jobs("outbox", JobStatus::Completed)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_delivery_is_signed_by_the_author() {
    let server = TestServer::new().await;
    let alice = server.create_actor("alice").await;
    let peer = MockPeer::start(&["bob"]).await;
    follow(&server, &peer, &["bob"], &alice).await;

    publish_note(&server, &alice, "signed").await;
    server.run_jobs().await;

    let received = peer
        .received_by("bob")
        .into_iter()
        .find(|received| received.json()["type"] == "Create")
        .unwrap();
    let signature = received.headers["signature"].to_str().unwrap();
    assert!(signature.contains(&format!("keyId=\"{}\"", alice.key_id())));
    verify_request(
        "POST",
        "/users/bob/inbox",
        &received.headers,
        &received.body,
        &alice.public_key_pem,
    )
    .unwrap();
}

#[tokio::test]
async fn test_blind_recipients_are_hidden_from_the_payload() {
    let server = TestServer::new().await;
    let alice = server.create_actor("alice").await;
    let peer = MockPeer::start(&["bob", "dave"]).await;
    follow(&server, &peer, &["bob"], &alice).await;

    let followers = alice.followers_uri.clone().unwrap();
    let note = builder::note(
        &format!("{}/notes/secret", alice.uri),
        &alice.uri,
        "psst",
        &[followers.as_str()],
        &[],
    );
    let mut create = builder::create(&activity_id(&alice.uri), &alice.uri, note);
    create["bcc"] = json!([peer.actor_uri("dave")]);
    server.state.publisher.publish(&alice.id, create).await.unwrap();
    server.run_jobs().await;

    let to_dave = creates(&peer, "dave");
    assert_eq!(to_dave.len(), 1);
    assert!(to_dave[0].get("bcc").is_none());
    assert_eq!(creates(&peer, "bob").len(), 1);
}

#[tokio::test]
async fn test_failing_inbox_is_retried_until_dead() {
    let server = TestServer::new().await;
    let alice = server.create_actor("alice").await;
    let peer = MockPeer::start(&["bob", "carol"]).await;
    follow(&server, &peer, &["bob", "carol"], &alice).await;

    peer.set_failing("carol", true);
    publish_note(&server, &alice, "retry").await;

    // Three attempts, the last one dead-letters the job
    for _ in 0..3 {
        assert_eq!(server.run_jobs().await, 1);
        server.expedite_jobs().await;
    }
    assert_eq!(server.run_jobs().await, 0);

    assert_eq!(creates(&peer, "bob").len(), 1);
    assert_eq!(creates(&peer, "carol").len(), 3);

    let dead = server.state.queue.dead_jobs(10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].kind, "outbox");
    assert_eq!(dead[0].attempts, 3);
    assert!(dead[0].last_error.as_deref().unwrap().contains("Delivery incomplete"));
}

#[tokio::test]
async fn test_recovered_inbox_gets_the_retry() {
    let server = TestServer::new().await;
    let alice = server.create_actor("alice").await;
    let peer = MockPeer::start(&["bob", "carol"]).await;
    follow(&server, &peer, &["bob", "carol"], &alice).await;

    peer.set_failing("carol", true);
    publish_note(&server, &alice, "flaky").await;
    server.run_jobs().await;

    peer.set_failing("carol", false);
    server.expedite_jobs().await;
    assert_eq!(server.run_jobs().await, 1);

    assert_eq!(creates(&peer, "bob").len(), 1);
    assert_eq!(creates(&peer, "carol").len(), 2);
    assert!(server.state.queue.dead_jobs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_and_metrics_report_queues() {
    METRICS.call_once(fedcore::metrics::init_metrics);
    let server = TestServer::new().await;
    let alice = server.create_actor("alice").await;
    let peer = MockPeer::start(&["bob"]).await;
    follow(&server, &peer, &["bob"], &alice).await;

    peer.set_failing("bob", true);
    publish_note(&server, &alice, "health").await;
    for _ in 0..3 {
        server.run_jobs().await;
        server.expedite_jobs().await;
    }

    let health: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["queues"]["outbox"]["dead"], 1);
    assert_eq!(health["queues"]["inbox"]["pending"], 0);

    let metrics = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("fedcore_jobs_total"));
    assert!(metrics.contains("fedcore_deliveries_total"));
}
