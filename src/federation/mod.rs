//! ActivityPub federation module
//!
//! Handles:
//! - HTTP Signatures and key access
//! - Remote object dereferencing
//! - Inbound activity processing (inbox)
//! - Outbound activity delivery (outbox)
//! - JSON-LD normalization of outbound documents
//! - Public key caching

mod activity;
pub mod builder;
mod inbox;
mod jsonld;
mod key_cache;
mod keys;
mod ledger;
mod outbox;
mod resolver;
mod signature;

pub use activity::{
    ACTIVITY_STREAMS_CONTEXT, ActivityKind, PUBLIC_COLLECTION, activity_type, actor_uri,
    all_ids, canonical_activity_uri, canonical_json_string, embedded_object, first_id,
    is_public_address, object_uri,
};
pub use builder::activity_id;
pub use inbox::{InboxOutcome, InboxProcessor};
pub(crate) use inbox::{relation_kind, reverse_relation};
pub use jsonld::SECURITY_CONTEXT;
pub use key_cache::{PublicKeyCache, SignerKey, key_owner_uri};
pub use keys::{DatabaseKeyStore, KeyStore};
pub use ledger::ProcessedActivityLedger;
pub use outbox::{
    CanonicalActivity, DeliveryReport, OutboxOutcome, OutboxProcessor, canonicalize_activity,
    deliver_to_inbox,
};
pub use resolver::{ACTIVITY_ACCEPT, HttpResolver, RemoteResolver, build_http_client};
pub use signature::{
    KeyPair, SignatureAlgorithm, SignatureHeaders, build_signing_string, compute_digest,
    extract_signature_key_id, generate_key_pair, host_header_value, key_id_matches_actor,
    parse_signature_header, sign, sign_request, verify, verify_request,
};

#[cfg(test)]
pub use keys::MockKeyStore;
#[cfg(test)]
pub use resolver::MockRemoteResolver;
