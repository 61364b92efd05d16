//! JSON-LD normalization of outbound documents
//!
//! Documents are expanded to an RDF dataset and normalized with RDFC-1.0
//! (the successor of URDNA2015). The ActivityStreams and security v1
//! contexts are substituted with local copies before expansion, so
//! normalization never reaches the network. Any other remote context is
//! refused.

use lazy_static::lazy_static;
use serde_json::{Map, Value, json};
use sophia_api::parser::QuadParser;
use sophia_api::quad::Spog;
use sophia_api::source::QuadSource;
use sophia_api::term::SimpleTerm;
use sophia_jsonld::JsonLdParser;
use std::collections::HashSet;

use super::activity::ACTIVITY_STREAMS_CONTEXT;
use crate::error::AppError;

pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";

const AS_TYPES: &[&str] = &[
    "Accept", "Activity", "Add", "Announce", "Application", "Arrive", "Article", "Audio",
    "Block", "Collection", "CollectionPage", "Create", "Delete", "Dislike", "Document",
    "Event", "Flag", "Follow", "Group", "Ignore", "Image", "IntransitiveActivity", "Invite",
    "Join", "Leave", "Like", "Link", "Listen", "Mention", "Move", "Note", "Object", "Offer",
    "OrderedCollection", "OrderedCollectionPage", "Organization", "Page", "Person", "Place",
    "Profile", "Question", "Read", "Reject", "Relationship", "Remove", "Service",
    "TentativeAccept", "TentativeReject", "Tombstone", "Travel", "Undo", "Update", "Video",
    "View",
];

const AS_REFERENCES: &[&str] = &[
    "actor", "anyOf", "attachment", "attributedTo", "audience", "bcc", "bto", "cc", "context",
    "current", "endpoints", "first", "generator", "href", "icon", "image", "inReplyTo",
    "instrument", "items", "last", "likes", "location", "next", "object", "oneOf", "origin",
    "partOf", "prev", "replies", "result", "sharedInbox", "shares", "tag", "target", "to",
    "url",
];

const AS_LITERALS: &[&str] = &["content", "mediaType", "name", "preferredUsername", "summary"];

const AS_DATES: &[&str] = &["deleted", "endTime", "published", "startTime", "updated"];

lazy_static! {
    static ref ACTIVITY_STREAMS: Value = activity_streams_context();
    static ref SECURITY: Value = json!({
        "id": "@id",
        "type": "@type",
        "sec": "https://w3id.org/security#",
        "dc": "http://purl.org/dc/terms/",
        "xsd": "http://www.w3.org/2001/XMLSchema#",
        "Key": "sec:Key",
        "RsaSignature2017": "sec:RsaSignature2017",
        "created": {"@id": "dc:created", "@type": "xsd:dateTime"},
        "creator": {"@id": "dc:creator", "@type": "@id"},
        "owner": {"@id": "sec:owner", "@type": "@id"},
        "publicKey": {"@id": "sec:publicKey", "@type": "@id"},
        "publicKeyPem": "sec:publicKeyPem",
        "signatureValue": "sec:signatureValue"
    });
}

fn activity_streams_context() -> Value {
    let mut context = Map::new();
    context.insert("as".into(), json!("https://www.w3.org/ns/activitystreams#"));
    context.insert("ldp".into(), json!("http://www.w3.org/ns/ldp#"));
    context.insert("xsd".into(), json!("http://www.w3.org/2001/XMLSchema#"));
    context.insert("id".into(), json!("@id"));
    context.insert("type".into(), json!("@type"));

    for name in AS_TYPES {
        context.insert((*name).into(), json!(format!("as:{}", name)));
    }
    context.insert("Public".into(), json!({"@id": "as:Public", "@type": "@id"}));

    for name in AS_REFERENCES {
        context.insert((*name).into(), json!({"@id": format!("as:{}", name), "@type": "@id"}));
    }
    for name in ["followers", "following", "liked", "outbox"] {
        context.insert(name.into(), json!({"@id": format!("as:{}", name), "@type": "@id"}));
    }
    context.insert("inbox".into(), json!({"@id": "ldp:inbox", "@type": "@id"}));
    context.insert(
        "orderedItems".into(),
        json!({"@id": "as:items", "@type": "@id", "@container": "@list"}),
    );

    for name in AS_LITERALS {
        context.insert((*name).into(), json!(format!("as:{}", name)));
    }
    context.insert("contentMap".into(), json!({"@id": "as:content", "@container": "@language"}));
    context.insert("nameMap".into(), json!({"@id": "as:name", "@container": "@language"}));
    context.insert("summaryMap".into(), json!({"@id": "as:summary", "@container": "@language"}));
    for name in AS_DATES {
        context.insert((*name).into(), json!({"@id": format!("as:{}", name), "@type": "xsd:dateTime"}));
    }
    context.insert("sensitive".into(), json!({"@id": "as:sensitive", "@type": "xsd:boolean"}));
    context.insert(
        "totalItems".into(),
        json!({"@id": "as:totalItems", "@type": "xsd:nonNegativeInteger"}),
    );

    Value::Object(context)
}

fn local_context(iri: &str) -> Result<Value, AppError> {
    match iri.trim_end_matches(".jsonld").trim_end_matches('/') {
        ACTIVITY_STREAMS_CONTEXT => Ok(ACTIVITY_STREAMS.clone()),
        SECURITY_CONTEXT => Ok(SECURITY.clone()),
        _ => Err(AppError::Canonicalization(format!(
            "unsupported remote context: {}",
            iri
        ))),
    }
}

fn inline_contexts(context: &Value) -> Result<Value, AppError> {
    match context {
        Value::String(iri) => local_context(iri),
        Value::Array(entries) => entries
            .iter()
            .map(inline_contexts)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Normalize a JSON-LD document to canonical N-Quads.
///
/// # Errors
/// `Canonicalization` when the document is not valid JSON-LD, names a
/// remote context other than ActivityStreams or security v1, or expands to
/// an empty dataset
pub fn normalize(document: &Value) -> Result<String, AppError> {
    let mut document = document.clone();
    let Some(fields) = document.as_object_mut() else {
        return Err(AppError::Canonicalization(
            "document is not a JSON object".to_string(),
        ));
    };
    if let Some(context) = fields.get("@context") {
        let inlined = inline_contexts(context)?;
        fields.insert("@context".to_string(), inlined);
    }

    let text = serde_json::to_string(&document)
        .map_err(|e| AppError::Canonicalization(e.to_string()))?;
    let dataset: HashSet<Spog<SimpleTerm<'static>>> = JsonLdParser::new()
        .parse_str(&text)
        .collect_quads()
        .map_err(|e| AppError::Canonicalization(format!("JSON-LD expansion failed: {}", e)))?;
    if dataset.is_empty() {
        return Err(AppError::Canonicalization(
            "document expands to an empty dataset".to_string(),
        ));
    }

    let mut output = Vec::new();
    sophia_c14n::rdfc10::normalize(&dataset, &mut output)
        .map_err(|e| AppError::Canonicalization(format!("normalization failed: {}", e)))?;
    String::from_utf8(output).map_err(|e| AppError::Canonicalization(e.to_string()))
}
