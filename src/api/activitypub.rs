//! ActivityPub endpoints
//!
//! - Actor profile
//! - Inbox (activity receiving)
//! - Followers collection

use axum::body::Bytes;
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::HeaderMap;
use serde_json::{Value, json};

use crate::AppState;
use crate::data::Actor;
use crate::error::AppError;
use crate::federation::{
    ACTIVITY_STREAMS_CONTEXT, actor_uri, extract_signature_key_id, key_id_matches_actor,
    verify_request,
};
use crate::jobs::{InboxJob, JobPayload};

const ACTIVITY_JSON: &str = "application/activity+json";

/// Create ActivityPub router
///
/// Routes:
/// - GET /users/:handle - Actor profile
/// - POST /users/:handle/inbox - Personal inbox
/// - POST /inbox - Shared inbox
/// - GET /users/:handle/followers - Followers collection
pub fn activitypub_router() -> Router<AppState> {
    Router::new()
        .route("/users/:handle", get(actor))
        .route("/users/:handle/inbox", post(inbox))
        .route("/inbox", post(shared_inbox))
        .route("/users/:handle/followers", get(followers))
}

fn activity_json(document: Value) -> Response {
    (
        [(header::CONTENT_TYPE, ACTIVITY_JSON)],
        document.to_string(),
    )
        .into_response()
}

async fn local_actor(state: &AppState, handle: &str) -> Result<Actor, AppError> {
    let actor = state.directory.find_by_handle(handle).await?;
    if !actor.is_local {
        return Err(AppError::NotFound);
    }
    Ok(actor)
}

/// GET /users/:handle
///
/// Returns the ActivityPub Actor document.
async fn actor(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Response, AppError> {
    let actor = local_actor(&state, &handle).await?;
    let document = state.directory.get_profile_document(&actor).await?;
    Ok(activity_json(document))
}

/// POST /users/:handle/inbox
async fn inbox(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let recipient = local_actor(&state, &handle).await?;
    receive(&state, &uri, &headers, &body, Some(recipient)).await
}

/// POST /inbox
async fn shared_inbox(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    receive(&state, &uri, &headers, &body, None).await
}

/// Authenticate an inbound activity and queue it.
///
/// # Steps
/// 1. Reject unsigned requests
/// 2. Check the signing key belongs to the activity's actor
/// 3. Verify the signature (refreshing a stale cached key once)
/// 4. Enqueue an inbox job and answer 202
async fn receive(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
    recipient: Option<Actor>,
) -> Result<StatusCode, AppError> {
    let _timer = crate::metrics::FEDERATION_REQUEST_DURATION_SECONDS
        .with_label_values(&["inbound"])
        .start_timer();

    if headers.get("signature").is_none() {
        return Err(AppError::Unauthorized);
    }

    let activity: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;
    let sender = actor_uri(&activity)
        .ok_or_else(|| AppError::Validation("Missing actor field".to_string()))?;

    // Ensure keyId points to the same actor before resolving key material.
    let key_id = extract_signature_key_id(headers)?;
    if !key_id_matches_actor(&key_id, &sender) {
        tracing::warn!(key_id = %key_id, actor = %sender, "Signature keyId does not match actor");
        return Err(AppError::Unauthorized);
    }

    let target = uri
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or_else(|| uri.path());
    let signer = state
        .key_cache
        .verify_with_refresh(&key_id, |public_key_pem| {
            verify_request("POST", target, headers, body, public_key_pem)
        })
        .await?;
    if signer.owner_uri != sender {
        return Err(AppError::Unauthorized);
    }

    let job_id = state
        .queue
        .enqueue(JobPayload::Inbox(InboxJob {
            activity,
            recipient_actor_id: recipient.map(|actor| actor.id),
        }))
        .await?;

    tracing::debug!(job_id = %job_id, actor = %sender, "Queued inbound activity");
    Ok(StatusCode::ACCEPTED)
}

/// GET /users/:handle/followers
///
/// Accepted followers as an OrderedCollection.
async fn followers(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Response, AppError> {
    let actor = local_actor(&state, &handle).await?;
    let followers = state.directory.followers_of(&actor).await?;

    Ok(activity_json(json!({
        "@context": ACTIVITY_STREAMS_CONTEXT,
        "type": "OrderedCollection",
        "id": actor.followers_uri.clone().unwrap_or_else(|| format!("{}/followers", actor.uri)),
        "totalItems": followers.len(),
        "orderedItems": followers
    })))
}
