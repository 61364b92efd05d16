//! Builders for outbound activity documents
//!
//! Every builder takes the activity id explicitly; [`activity_id`] mints one
//! under the sending actor's URI.

use serde_json::{Value, json};

use super::activity::{ACTIVITY_STREAMS_CONTEXT, PUBLIC_COLLECTION};
use crate::data::EntityId;

/// Mint a fresh activity id: `{actor_uri}/activities/{ulid}`
pub fn activity_id(actor_uri: &str) -> String {
    format!("{}/activities/{}", actor_uri, EntityId::new().0)
}

fn envelope(kind: &str, id: &str, actor: &str, object: Value) -> Value {
    json!({
        "@context": ACTIVITY_STREAMS_CONTEXT,
        "type": kind,
        "id": id,
        "actor": actor,
        "object": object
    })
}

fn with_audience(mut activity: Value, to: &[&str], cc: &[&str]) -> Value {
    activity["to"] = json!(to);
    activity["cc"] = json!(cc);
    activity
}

pub fn follow(id: &str, actor: &str, followee: &str) -> Value {
    with_audience(envelope("Follow", id, actor, json!(followee)), &[followee], &[])
}

/// Accept a Follow; `follow` is the original activity document
pub fn accept(id: &str, actor: &str, follow: Value) -> Value {
    let follower = super::activity::actor_uri(&follow);
    let activity = envelope("Accept", id, actor, follow);
    match follower {
        Some(follower) => with_audience(activity, &[follower.as_str()], &[]),
        None => activity,
    }
}

pub fn reject(id: &str, actor: &str, follow: Value) -> Value {
    let follower = super::activity::actor_uri(&follow);
    let activity = envelope("Reject", id, actor, follow);
    match follower {
        Some(follower) => with_audience(activity, &[follower.as_str()], &[]),
        None => activity,
    }
}

/// Wrap an object (usually a Note) in a Create, copying its addressing
pub fn create(id: &str, actor: &str, object: Value) -> Value {
    let to = object.get("to").cloned().unwrap_or_else(|| json!([]));
    let cc = object.get("cc").cloned().unwrap_or_else(|| json!([]));
    let mut activity = envelope("Create", id, actor, object);
    activity["to"] = to;
    activity["cc"] = cc;
    activity["published"] = json!(chrono::Utc::now().to_rfc3339());
    activity
}

/// A public Note addressed to the public collection and the author's followers
pub fn public_note(id: &str, author: &str, followers: &str, content: &str) -> Value {
    note(id, author, content, &[PUBLIC_COLLECTION], &[followers])
}

pub fn note(id: &str, author: &str, content: &str, to: &[&str], cc: &[&str]) -> Value {
    with_audience(
        json!({
            "type": "Note",
            "id": id,
            "attributedTo": author,
            "content": content,
            "published": chrono::Utc::now().to_rfc3339()
        }),
        to,
        cc,
    )
}

pub fn like(id: &str, actor: &str, object: &str) -> Value {
    envelope("Like", id, actor, json!(object))
}

pub fn announce(id: &str, actor: &str, object: &str, to: &[&str], cc: &[&str]) -> Value {
    let mut activity = with_audience(envelope("Announce", id, actor, json!(object)), to, cc);
    activity["published"] = json!(chrono::Utc::now().to_rfc3339());
    activity
}

pub fn block(id: &str, actor: &str, blocked: &str) -> Value {
    with_audience(envelope("Block", id, actor, json!(blocked)), &[blocked], &[])
}

/// Undo an earlier activity; the original document is embedded
pub fn undo(id: &str, actor: &str, original: Value) -> Value {
    let to = original.get("to").cloned();
    let mut activity = envelope("Undo", id, actor, original);
    if let Some(to) = to {
        activity["to"] = to;
    }
    activity
}

/// Delete an object, leaving a Tombstone in its place
pub fn delete(id: &str, actor: &str, object: &str, to: &[&str], cc: &[&str]) -> Value {
    with_audience(
        envelope(
            "Delete",
            id,
            actor,
            json!({ "type": "Tombstone", "id": object }),
        ),
        to,
        cc,
    )
}
