//! Activity vocabulary
//!
//! The closed set of activity types the engine understands, plus helpers to
//! read the loosely typed fields of ActivityStreams documents.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// ActivityStreams namespace, used as `@context`
pub const ACTIVITY_STREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Public addressing sentinel
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Whether an address is the public sentinel, in any of its spellings
pub fn is_public_address(address: &str) -> bool {
    matches!(address, PUBLIC_COLLECTION | "as:Public" | "Public")
}

/// Activity types dispatched by the inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Follow,
    Accept,
    Reject,
    Like,
    Announce,
    Undo,
    Block,
    /// Stored, but no side effects
    Unknown(String),
}

impl ActivityKind {
    pub fn from_type(activity_type: &str) -> Self {
        match activity_type {
            "Create" => Self::Create,
            "Update" => Self::Update,
            "Delete" => Self::Delete,
            "Follow" => Self::Follow,
            "Accept" => Self::Accept,
            "Reject" => Self::Reject,
            "Like" => Self::Like,
            "Announce" => Self::Announce,
            "Undo" => Self::Undo,
            "Block" => Self::Block,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Kind of an activity document, `None` without a usable `type`
    pub fn of(activity: &Value) -> Option<Self> {
        activity_type(activity).map(Self::from_type)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Follow => "Follow",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Undo => "Undo",
            Self::Block => "Block",
            Self::Unknown(other) => other,
        }
    }

    /// Label for metrics; unknown types collapse into one series
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Follow => "Follow",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Undo => "Undo",
            Self::Block => "Block",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// URI named by a reference field.
///
/// Accepts a string, an object with `id`, or an array (first usable entry).
pub fn first_id(value: &Value) -> Option<String> {
    match value {
        Value::String(uri) => {
            let uri = uri.trim();
            (!uri.is_empty()).then(|| uri.to_string())
        }
        Value::Object(map) => map.get("id").and_then(first_id),
        Value::Array(items) => items.iter().find_map(first_id),
        _ => None,
    }
}

/// All URIs named by a scalar-or-list reference field, nulls dropped
pub fn all_ids(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(first_id).collect(),
        other => first_id(other).into_iter().collect(),
    }
}

/// `type` of a document (first entry when it is a list)
pub fn activity_type(document: &Value) -> Option<&str> {
    match document.get("type")? {
        Value::String(kind) => Some(kind.as_str()),
        Value::Array(kinds) => kinds.iter().find_map(Value::as_str),
        _ => None,
    }
}

pub fn actor_uri(activity: &Value) -> Option<String> {
    activity.get("actor").and_then(first_id)
}

pub fn object_uri(activity: &Value) -> Option<String> {
    activity.get("object").and_then(first_id)
}

/// The embedded object, when the activity carries one rather than a bare URI
pub fn embedded_object(activity: &Value) -> Option<&Value> {
    activity.get("object").filter(|object| object.is_object())
}

/// Deterministic serialization: object keys sorted at every depth.
pub fn canonical_json_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Canonical URI of an inbound activity.
///
/// The trimmed `id` when present; otherwise a content-derived URN so that
/// redeliveries of the same anonymous payload still deduplicate.
pub fn canonical_activity_uri(activity: &Value) -> String {
    if let Some(id) = activity.get("id").and_then(Value::as_str) {
        let id = id.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical_json_string(activity).as_bytes());
    format!(
        "urn:fedcore:activity:{}",
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    )
}
